//! Inbound realtime events.
//!
//! The broker wraps every event in a `message` frame whose `payload` is the
//! JSON-encoded event. Two payload shapes exist: change notifications tagged
//! with `type` and approval replies carrying a `requestId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::realtime::topic::Topic;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn verb(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Something was created, updated or deleted in a scope the user follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub class_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub quiz_id: Option<i64>,
    pub student_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub message: Option<String>,
}

impl ChangeEvent {
    /// The payload's id field for `scope`, e.g. `classId` for `class`.
    pub fn scope_id(&self, scope: &str) -> Option<i64> {
        match scope {
            "class" => self.class_id,
            "assignment" => self.assignment_id,
            "quiz" => self.quiz_id,
            "student" => self.student_id,
            "comment" => self.comment_id,
            _ => None,
        }
    }

    /// First scope the payload names, most specific container first.
    fn payload_scope(&self) -> Option<(&'static str, i64)> {
        [
            ("class", self.class_id),
            ("assignment", self.assignment_id),
            ("quiz", self.quiz_id),
            ("student", self.student_id),
        ]
        .into_iter()
        .find_map(|(scope, id)| id.map(|id| (scope, id)))
    }
}

/// Point-to-point reply to a request the user made (enrollment, extension...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub request_id: i64,
    pub approved: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Change(ChangeEvent),
    Approval(ApprovalEvent),
}

/// Scope an event is about, e.g. `class` / `42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventScope {
    pub scope: String,
    pub id: String,
}

/// A parsed inbound message, delivered to every bus subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    pub topic: Topic,
    pub message_id: String,
    pub timestamp: i64,
    pub body: EventBody,
}

impl RealtimeEvent {
    pub fn parse(topic: &str, payload: &str, message_id: &str, timestamp: i64) -> Result<Self> {
        let topic: Topic = topic.parse()?;
        let value: Value = serde_json::from_str(payload)?;
        let body = if value.get("requestId").is_some() {
            EventBody::Approval(serde_json::from_value(value)?)
        } else {
            EventBody::Change(serde_json::from_value(value)?)
        };
        Ok(Self {
            topic,
            message_id: message_id.to_string(),
            timestamp,
            body,
        })
    }

    pub fn change(&self) -> Option<&ChangeEvent> {
        match &self.body {
            EventBody::Change(change) => Some(change),
            EventBody::Approval(_) => None,
        }
    }

    pub fn approval(&self) -> Option<&ApprovalEvent> {
        match &self.body {
            EventBody::Approval(approval) => Some(approval),
            EventBody::Change(_) => None,
        }
    }

    /// Scope of a change event. The payload's own id field wins over the
    /// topic id; private queues rely on the payload alone.
    pub fn scope(&self) -> Option<EventScope> {
        let change = self.change()?;
        match &self.topic {
            Topic::Scoped { scope, id, .. } => Some(EventScope {
                scope: scope.clone(),
                id: change
                    .scope_id(scope)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| id.clone()),
            }),
            Topic::Queue { .. } => change.payload_scope().map(|(scope, id)| EventScope {
                scope: scope.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
