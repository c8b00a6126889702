//! In-memory stand-ins for the network seams, shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::comments::{Comment, CommentApi, NewComment, ParentKey, RemotePage};
use crate::navigation::Navigator;
use crate::notify::{HideReason, Presenter, Toast};
use crate::realtime::{ClassDirectory, Identity, ManagerOptions, RealtimeEvent};
use crate::transport::{ClientFrame, Connector, Link, ServerFrame};
use crate::utils::error::{ApiError, ClientError, Result};

pub(crate) fn test_options() -> ManagerOptions {
    ManagerOptions {
        reconnect: false,
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_attempts: 3,
        class_resources: vec!["assignments".to_string()],
        private_queues: vec!["approvals".to_string()],
    }
}

pub(crate) fn event(topic: &str, payload: Value) -> RealtimeEvent {
    RealtimeEvent::parse(topic, &payload.to_string(), "m-1", 0).unwrap()
}

/// Poll `condition` until it holds, failing the test after about a second.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// The broker side of one fake connection.
pub(crate) struct FakeRemote {
    sent: Mutex<UnboundedReceiver<ClientFrame>>,
    push: Mutex<Option<UnboundedSender<ServerFrame>>>,
}

impl FakeRemote {
    pub(crate) fn push_event(&self, topic: &str, payload: Value, qos: u8) {
        let frame = ServerFrame::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
            timestamp: 0,
            message_id: format!("{topic}-msg"),
            qos,
        };
        if let Some(push) = self.push.lock().unwrap().as_ref() {
            push.send(frame).unwrap();
        }
    }

    /// Frames the client sent so far.
    pub(crate) fn drain_sent(&self) -> Vec<ClientFrame> {
        let mut sent = self.sent.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub(crate) fn subscribed_topics(&self) -> Vec<String> {
        self.drain_sent()
            .into_iter()
            .filter_map(|frame| match frame {
                ClientFrame::Subscribe { topic } => Some(topic),
                _ => None,
            })
            .collect()
    }

    /// Simulate the broker going away.
    pub(crate) fn drop_connection(&self) {
        self.push.lock().unwrap().take();
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    opens: AtomicUsize,
    failures: AtomicUsize,
    gate: Option<Arc<Notify>>,
    remotes: Mutex<Vec<Arc<FakeRemote>>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every `open` waits for a permit on `gate`.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// The next `count` opens fail.
    pub(crate) fn failing(count: usize) -> Self {
        let connector = Self::default();
        connector.failures.store(count, Ordering::SeqCst);
        connector
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn remote(&self, index: usize) -> Arc<FakeRemote> {
        Arc::clone(&self.remotes.lock().unwrap()[index])
    }

    pub(crate) fn remote_count(&self) -> usize {
        self.remotes.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, _user_id: i64, _token: Option<&str>) -> Result<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Realtime("handshake refused".to_string()));
        }

        let (outbound, sent) = mpsc::unbounded_channel();
        let (push, inbound) = mpsc::unbounded_channel();
        self.remotes.lock().unwrap().push(Arc::new(FakeRemote {
            sent: Mutex::new(sent),
            push: Mutex::new(Some(push)),
        }));
        Ok(Link {
            outbound,
            inbound,
            io_task: None,
        })
    }
}

pub(crate) struct FakeDirectory {
    classes: Vec<i64>,
    fail: AtomicBool,
}

impl FakeDirectory {
    pub(crate) fn new(classes: Vec<i64>) -> Self {
        Self {
            classes,
            fail: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClassDirectory for FakeDirectory {
    async fn class_ids(&self, _identity: &Identity) -> Result<Vec<i64>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::network("Could not reach the server.").into());
        }
        Ok(self.classes.clone())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNavigator {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) -> Result<()> {
        self.routes.lock().unwrap().push(route.to_string());
        if self.fail {
            return Err(ClientError::Navigation(format!("no page for {route}")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingPresenter {
    shown: Mutex<Vec<Toast>>,
    hidden: Mutex<Vec<(String, HideReason)>>,
}

impl RecordingPresenter {
    pub(crate) fn shown(&self) -> Vec<Toast> {
        self.shown.lock().unwrap().clone()
    }

    pub(crate) fn hidden(&self) -> Vec<(String, HideReason)> {
        self.hidden.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn show(&self, toast: &Toast) {
        self.shown.lock().unwrap().push(toast.clone());
    }

    fn hide(&self, toast: &Toast, reason: HideReason) {
        self.hidden
            .lock()
            .unwrap()
            .push((toast.key.clone(), reason));
    }
}

pub(crate) fn at_minute(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()
}

pub(crate) fn comment(id: i64, minute: u32) -> Comment {
    Comment {
        id,
        content: format!("comment {id}"),
        parent_id: None,
        author: Some("ada".to_string()),
        created_at: at_minute(minute),
        reply_count: 0,
    }
}

/// Server-side comment store. Every call yields once before answering so
/// concurrent callers interleave.
pub(crate) struct FakeCommentApi {
    stored: Mutex<Vec<Comment>>,
    fetches: AtomicUsize,
    fail_creates: AtomicBool,
    next_id: AtomicI64,
    create_gate: Option<Arc<Notify>>,
}

impl FakeCommentApi {
    pub(crate) fn with_comments(count: i64) -> Self {
        let stored = (1..=count)
            .map(|id| comment(id, id as u32 % 60))
            .collect::<Vec<_>>();
        Self {
            stored: Mutex::new(stored),
            fetches: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            next_id: AtomicI64::new(1000),
            create_gate: None,
        }
    }

    pub(crate) fn gated_creates(mut self, gate: Arc<Notify>) -> Self {
        self.create_gate = Some(gate);
        self
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn insert(&self, comment: Comment) {
        self.stored.lock().unwrap().push(comment);
    }
}

#[async_trait]
impl CommentApi for FakeCommentApi {
    async fn fetch_page(
        &self,
        _parent: &ParentKey,
        offset: usize,
        limit: usize,
    ) -> Result<RemotePage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let stored = self.stored.lock().unwrap();
        let items: Vec<Comment> = stored.iter().skip(offset).take(limit).cloned().collect();
        Ok(RemotePage {
            has_more: offset + items.len() < stored.len(),
            items,
        })
    }

    async fn create(&self, _parent: &ParentKey, comment: &NewComment) -> Result<Comment> {
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ApiError::from_response(500, r#"{"message":"database unavailable"}"#).into());
        }
        let created = Comment {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            content: comment.content.clone(),
            parent_id: comment.parent_id,
            author: Some("me".to_string()),
            created_at: at_minute(59),
            reply_count: 0,
        };
        self.stored.lock().unwrap().push(created.clone());
        Ok(created)
    }
}
