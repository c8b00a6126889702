use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::realtime::event::RealtimeEvent;
use crate::utils::error::ClientError;

const REPLIES_SCOPE: &str = "comment";

/// Identifies one comment thread: the root discussion of a scope
/// (`assignment:37`) or the replies of a comment (`comment:12`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParentKey {
    scope: String,
    id: String,
}

impl ParentKey {
    pub fn root(scope: &str, id: impl fmt::Display) -> Self {
        Self {
            scope: scope.to_string(),
            id: id.to_string(),
        }
    }

    pub fn replies(comment_id: i64) -> Self {
        Self::root(REPLIES_SCOPE, comment_id)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_replies(&self) -> bool {
        self.scope == REPLIES_SCOPE
    }

    /// REST collection holding the thread, relative to the API base URL.
    pub fn collection_path(&self) -> String {
        if self.is_replies() {
            format!("comments/{}/replies", self.id)
        } else {
            format!("{}s/{}/comments", self.scope, self.id)
        }
    }

    /// Whether `event` reports a change inside this thread.
    pub fn affected_by(&self, event: &RealtimeEvent) -> bool {
        let Some(change) = event.change() else {
            return false;
        };
        if self.is_replies() && change.parent_id.map(|id| id.to_string()) == Some(self.id.clone())
        {
            return true;
        }
        event
            .scope()
            .is_some_and(|scope| scope.scope == self.scope && scope.id == self.id)
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.id)
    }
}

impl FromStr for ParentKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((scope, id))
                if !scope.trim().is_empty() && !id.trim().is_empty() && !id.contains(':') =>
            {
                Ok(Self::root(scope.trim(), id.trim()))
            }
            _ => Err(ClientError::Key(s.to_string())),
        }
    }
}

/// A comment as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_count: u32,
}

/// Optimistic local record awaiting the server's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingComment {
    pub client_ref: Uuid,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One row of a flattened thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Confirmed(Comment),
    Pending(PendingComment),
}

impl Entry {
    pub fn content(&self) -> &str {
        match self {
            Entry::Confirmed(comment) => &comment.content,
            Entry::Pending(pending) => &pending.content,
        }
    }

    /// Server id, once assigned.
    pub fn id(&self) -> Option<i64> {
        match self {
            Entry::Confirmed(comment) => Some(comment.id),
            Entry::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending(_))
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<i64>,
}

/// One page as returned by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    pub items: Vec<Comment>,
    #[serde(default)]
    pub has_more: bool,
}

/// One page as handed to consumers. `items` never repeats an id already
/// returned by an earlier page of the same thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub items: Vec<Comment>,
    pub has_more: bool,
}
