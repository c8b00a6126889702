//! Toast records and the pure functions deriving them from events.

use tokio::time::Instant;
use uuid::Uuid;

use crate::realtime::Topic;
use crate::realtime::event::{ChangeKind, EventBody, RealtimeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
}

/// A transient alert shown for one logical notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    /// Distinguishes successive toasts with the same key.
    pub id: Uuid,
    pub key: String,
    pub title: String,
    pub message: String,
    pub level: ToastLevel,
    pub route: Option<String>,
    pub shown_at: Instant,
    pub expires_at: Instant,
}

impl Toast {
    pub fn from_event(event: &RealtimeEvent, shown_at: Instant, expires_at: Instant) -> Self {
        let (title, message, level) = headline(event);
        Self {
            id: Uuid::new_v4(),
            key: dedup_key(event),
            title,
            message,
            level,
            route: route_for(event),
            shown_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Deterministic key collapsing repeated deliveries of one notification.
///
/// Built only from stable payload fields, so a redelivery after a reconnect
/// or the same notification arriving on a class topic and a private queue
/// map to the same key.
pub fn dedup_key(event: &RealtimeEvent) -> String {
    match &event.body {
        EventBody::Approval(approval) => format!("approval:{}", approval.request_id),
        EventBody::Change(change) => {
            let title = change.title.as_deref().unwrap_or_default();
            match event.scope() {
                Some(scope) => format!(
                    "{}:{}:{}:{}",
                    scope.scope,
                    scope.id,
                    change.kind.verb(),
                    title
                ),
                // no payload scope to go on
                None => format!("{}:{}:{}", event.topic, change.kind.verb(), title),
            }
        }
    }
}

/// Where clicking the toast takes the user.
pub fn route_for(event: &RealtimeEvent) -> Option<String> {
    match &event.body {
        EventBody::Approval(approval) => Some(format!("/requests/{}", approval.request_id)),
        EventBody::Change(_) => {
            let scope = event.scope()?;
            let route = match scope.scope.as_str() {
                "class" => match &event.topic {
                    Topic::Scoped { resource, .. } => {
                        format!("/classes/{}/{resource}", scope.id)
                    }
                    // a queue kind is not a class page
                    Topic::Queue { .. } => format!("/classes/{}", scope.id),
                },
                "assignment" => format!("/assignments/{}", scope.id),
                "quiz" => format!("/quizzes/{}", scope.id),
                "student" => format!("/students/{}", scope.id),
                other => format!("/{other}s/{}", scope.id),
            };
            Some(route)
        }
    }
}

fn headline(event: &RealtimeEvent) -> (String, String, ToastLevel) {
    match &event.body {
        EventBody::Approval(approval) => {
            let (title, level) = if approval.approved {
                ("Request approved", ToastLevel::Success)
            } else {
                ("Request declined", ToastLevel::Warning)
            };
            (
                title.to_string(),
                approval.message.clone().unwrap_or_default(),
                level,
            )
        }
        EventBody::Change(change) => {
            let title = change
                .title
                .clone()
                .unwrap_or_else(|| {
                    format!("{} {}", singular(event.topic.resource()), change.kind.verb())
                });
            let mut message = change
                .message
                .clone()
                .or_else(|| change.description.clone())
                .unwrap_or_default();
            if let Some(due) = &change.due_date {
                if change.kind != ChangeKind::Deleted {
                    if !message.is_empty() {
                        message.push_str(" · ");
                    }
                    message.push_str(&format!("due {due}"));
                }
            }
            let level = match change.kind {
                ChangeKind::Deleted => ToastLevel::Warning,
                _ => ToastLevel::Info,
            };
            (title, message, level)
        }
    }
}

fn singular(resource: &str) -> String {
    let name = match resource {
        "quizzes" => "quiz",
        other => other.strip_suffix('s').unwrap_or(other),
    };
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
