use std::fmt;
use std::str::FromStr;

use crate::utils::error::ClientError;

/// A named channel of realtime interest.
///
/// Broadcast topics look like `scope/{id}/resource` (`class/42/assignments`);
/// private queues look like `user/{id}/queue/{kind}` (`user/7/queue/approvals`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Scoped {
        scope: String,
        id: String,
        resource: String,
    },
    Queue {
        user_id: String,
        kind: String,
    },
}

impl Topic {
    pub fn scoped(scope: &str, id: impl fmt::Display, resource: &str) -> Self {
        Topic::Scoped {
            scope: scope.to_string(),
            id: id.to_string(),
            resource: resource.to_string(),
        }
    }

    pub fn class(class_id: i64, resource: &str) -> Self {
        Self::scoped("class", class_id, resource)
    }

    pub fn queue(user_id: i64, kind: &str) -> Self {
        Topic::Queue {
            user_id: user_id.to_string(),
            kind: kind.to_string(),
        }
    }

    /// `(scope, id)` for broadcast topics.
    pub fn scope(&self) -> Option<(&str, &str)> {
        match self {
            Topic::Scoped { scope, id, .. } => Some((scope, id)),
            Topic::Queue { .. } => None,
        }
    }

    /// Resource of a broadcast topic, kind of a private queue.
    pub fn resource(&self) -> &str {
        match self {
            Topic::Scoped { resource, .. } => resource,
            Topic::Queue { kind, .. } => kind,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Scoped {
                scope,
                id,
                resource,
            } => write!(f, "{scope}/{id}/{resource}"),
            Topic::Queue { user_id, kind } => write!(f, "user/{user_id}/queue/{kind}"),
        }
    }
}

impl FromStr for Topic {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.trim_matches('/').split('/').collect();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(ClientError::Topic(s.to_string()));
        }
        match segments.as_slice() {
            ["user", user_id, "queue", kind] => Ok(Topic::Queue {
                user_id: user_id.to_string(),
                kind: kind.to_string(),
            }),
            [scope, id, resource] => Ok(Topic::Scoped {
                scope: scope.to_string(),
                id: id.to_string(),
                resource: resource.to_string(),
            }),
            _ => Err(ClientError::Topic(s.to_string())),
        }
    }
}
