//! Realtime connection manager
//!
//! Owns the one realtime connection of the client and multiplexes every topic
//! interest over it.
//!
//! Lifecycle: `Idle → Connecting → Connected → Idle`.
//! - `connect` is a no-op unless the manager is `Idle`, so concurrent calls
//!   open a single connection.
//! - Topics registered with `watch` before the handshake completes are queued
//!   and subscribed once it does.
//! - A dropped connection returns to `Idle` and, when enabled, schedules a
//!   reconnect with linear backoff.
//!
//! Concurrency notes: state lives behind a `std::sync::Mutex` that is never
//! held across an `.await`. Each connect attempt and each disconnect bumps a
//! generation counter; anything that resumes after an await re-checks it and
//! gives up if the world moved on.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{RealtimeSettings, Settings};
use crate::persistence::SessionStore;
use crate::realtime::bus::{EventBus, Subscription};
use crate::realtime::directory::ClassDirectory;
use crate::realtime::event::RealtimeEvent;
use crate::realtime::topic::Topic;
use crate::transport::{ClientFrame, Connector, Link, ServerFrame};
use crate::utils::error::{ClientError, Result};

/// Who the connection is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The identity of the stored session, if someone is signed in.
    pub fn from_session(session: &SessionStore) -> Result<Option<Self>> {
        let Some(profile) = session.profile()? else {
            return Ok(None);
        };
        Ok(Some(Self {
            user_id: profile.id,
            token: session.token()?,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Resources followed for every class of the identity.
    pub class_resources: Vec<String>,
    /// Private queues followed for the identity.
    pub private_queues: Vec<String>,
}

impl From<&RealtimeSettings> for ManagerOptions {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            reconnect: settings.reconnect,
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            class_resources: settings.class_resources.clone(),
            private_queues: settings.private_queues.clone(),
        }
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from(&Settings::default().realtime)
    }
}

#[derive(Default)]
struct State {
    phase: Phase,
    generation: u64,
    identity: Option<Identity>,
    /// Topic → number of live leases.
    interests: BTreeMap<Topic, usize>,
    /// Topics derived from the identity on the last connect.
    derived: BTreeSet<Topic>,
    /// Topics subscribed on the current connection.
    server_topics: BTreeSet<Topic>,
    outbound: Option<UnboundedSender<ClientFrame>>,
    dispatcher: Option<JoinHandle<()>>,
    io_task: Option<JoinHandle<()>>,
    reconnect_attempts: u32,
    reconnect_task: Option<JoinHandle<()>>,
    connections_opened: u64,
}

impl State {
    fn send(&self, frame: ClientFrame) -> bool {
        match &self.outbound {
            Some(outbound) => outbound.send(frame).is_ok(),
            None => false,
        }
    }

    fn close_connection(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            for topic in &self.server_topics {
                let _ = outbound.send(ClientFrame::Unsubscribe {
                    topic: topic.to_string(),
                });
            }
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        if let Some(io_task) = self.io_task.take() {
            io_task.abort();
        }
        self.server_topics.clear();
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    directory: Arc<dyn ClassDirectory>,
    options: ManagerOptions,
    bus: EventBus,
    state: Mutex<State>,
}

/// Shared handle to the connection manager. Clones refer to the same
/// connection.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<Inner>,
}

impl RealtimeManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        directory: Arc<dyn ClassDirectory>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                directory,
                options,
                bus: EventBus::new(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Register a callback for every broadcast event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(callback)
    }

    /// Number of connections successfully established so far.
    pub fn connections_opened(&self) -> u64 {
        self.state().connections_opened
    }

    /// Topics subscribed on the live connection.
    pub fn server_topics(&self) -> Vec<Topic> {
        self.state().server_topics.iter().cloned().collect()
    }

    /// Register interest in `topic`. The topic is subscribed on the server
    /// now if connected, otherwise as soon as the handshake completes.
    pub fn watch(&self, topic: Topic) -> TopicLease {
        let mut guard = self.state();
        let state = &mut *guard;

        let count = state.interests.entry(topic.clone()).or_insert(0);
        *count += 1;
        let first = *count == 1;

        if first && state.phase == Phase::Connected && !state.server_topics.contains(&topic) {
            if state.send(ClientFrame::Subscribe {
                topic: topic.to_string(),
            }) {
                debug!(%topic, "subscribed");
            }
            state.server_topics.insert(topic.clone());
        }

        TopicLease {
            topic,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn release_topic(&self, topic: &Topic) {
        let mut guard = self.state();
        let state = &mut *guard;

        let remaining = match state.interests.get_mut(topic) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining > 0 {
            return;
        }
        state.interests.remove(topic);

        if state.phase == Phase::Connected
            && !state.derived.contains(topic)
            && state.server_topics.remove(topic)
        {
            state.send(ClientFrame::Unsubscribe {
                topic: topic.to_string(),
            });
            debug!(%topic, "unsubscribed");
        }
    }

    /// Open the connection for `identity` unless one is open or opening.
    ///
    /// Failures are logged and leave the manager `Idle` so a later call can
    /// retry; they are never returned.
    pub async fn connect(&self, identity: Identity) {
        let generation = {
            let mut state = self.state();
            if state.phase != Phase::Idle {
                debug!(phase = ?state.phase, "connect ignored, connection already in progress");
                return;
            }
            if let Some(task) = state.reconnect_task.take() {
                task.abort();
            }
            state.phase = Phase::Connecting;
            state.generation += 1;
            state.identity = Some(identity.clone());
            state.generation
        };

        match self.establish(&identity, generation).await {
            Ok(true) => info!(user_id = identity.user_id, "realtime connected"),
            Ok(false) => debug!(user_id = identity.user_id, "connect superseded by disconnect"),
            Err(error) => {
                warn!(user_id = identity.user_id, "realtime connect failed: {error}");
                {
                    let mut state = self.state();
                    if state.generation == generation {
                        state.phase = Phase::Idle;
                    }
                }
                self.schedule_reconnect(generation);
            }
        }
    }

    async fn derive_topics(&self, identity: &Identity) -> Result<BTreeSet<Topic>> {
        let options = &self.inner.options;
        let mut topics = BTreeSet::new();

        if !options.class_resources.is_empty() {
            let classes = self.inner.directory.class_ids(identity).await?;
            for class_id in classes {
                for resource in &options.class_resources {
                    topics.insert(Topic::class(class_id, resource));
                }
            }
        }
        for kind in &options.private_queues {
            topics.insert(Topic::queue(identity.user_id, kind));
        }
        Ok(topics)
    }

    /// Returns `Ok(false)` when a disconnect happened while the handshake was
    /// in flight; the fresh link is closed in that case.
    async fn establish(&self, identity: &Identity, generation: u64) -> Result<bool> {
        let derived = self.derive_topics(identity).await?;
        let Link {
            outbound,
            inbound,
            io_task,
        } = self
            .inner
            .connector
            .open(identity.user_id, identity.token.as_deref())
            .await?;

        let mut guard = self.state();
        let state = &mut *guard;

        if state.generation != generation || state.phase != Phase::Connecting {
            if let Some(io_task) = io_task {
                io_task.abort();
            }
            return Ok(false);
        }

        let topics: BTreeSet<Topic> = state
            .interests
            .keys()
            .chain(derived.iter())
            .cloned()
            .collect();
        for topic in &topics {
            let frame = ClientFrame::Subscribe {
                topic: topic.to_string(),
            };
            if outbound.send(frame).is_err() {
                if let Some(io_task) = io_task {
                    io_task.abort();
                }
                return Err(ClientError::Realtime(
                    "connection closed while subscribing".to_string(),
                ));
            }
        }
        debug!(count = topics.len(), "subscribed topics");

        state.derived = derived;
        state.server_topics = topics;
        state.outbound = Some(outbound);
        state.io_task = io_task;
        state.dispatcher = Some(self.spawn_dispatcher(inbound, generation));
        state.phase = Phase::Connected;
        state.reconnect_attempts = 0;
        state.connections_opened += 1;
        Ok(true)
    }

    fn spawn_dispatcher(
        &self,
        mut inbound: UnboundedReceiver<ServerFrame>,
        generation: u64,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            // frames are handled one at a time, in arrival order
            while let Some(frame) = inbound.recv().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                RealtimeManager { inner }.handle_frame(frame);
            }
            if let Some(inner) = weak.upgrade() {
                RealtimeManager { inner }.connection_lost(generation);
            }
        })
    }

    fn handle_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Message {
                topic,
                payload,
                timestamp,
                message_id,
                qos,
            } => {
                match RealtimeEvent::parse(&topic, &payload, &message_id, timestamp) {
                    Ok(event) => {
                        let delivered = self.inner.bus.broadcast(&event);
                        debug!(topic = %event.topic, delivered, "event dispatched");
                    }
                    Err(e) => warn!(%topic, "dropping unreadable event: {e}"),
                }
                if qos == 1 {
                    self.state().send(ClientFrame::Ack { message_id });
                }
            }
            ServerFrame::Error { message } => warn!("realtime server error: {message}"),
            ServerFrame::Authenticated {} => debug!("authentication acknowledged"),
        }
    }

    fn connection_lost(&self, generation: u64) {
        {
            let mut state = self.state();
            if state.generation != generation || state.phase != Phase::Connected {
                return;
            }
            warn!("realtime connection lost");
            // this runs on the dispatcher itself; detach instead of aborting
            state.dispatcher = None;
            state.close_connection();
            state.phase = Phase::Idle;
        }
        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(&self, generation: u64) {
        let options = &self.inner.options;
        if !options.reconnect {
            return;
        }

        let mut state = self.state();
        if state.generation != generation || state.phase != Phase::Idle {
            return;
        }
        let Some(identity) = state.identity.clone() else {
            return;
        };
        if state.reconnect_attempts >= options.max_reconnect_attempts {
            warn!(
                attempts = state.reconnect_attempts,
                "giving up on realtime reconnect"
            );
            return;
        }
        state.reconnect_attempts += 1;
        let delay = backoff(options.reconnect_delay, state.reconnect_attempts);
        info!(
            attempt = state.reconnect_attempts,
            ?delay,
            "scheduling realtime reconnect"
        );

        let weak = Arc::downgrade(&self.inner);
        // spawned under the lock so the handle is stored before the task can look for it
        state.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = RealtimeManager { inner };
            {
                let mut state = manager.state();
                if state.generation != generation {
                    return;
                }
                state.reconnect_task = None;
            }
            manager.connect(identity).await;
        }));
    }

    /// Close the connection if there is one. Also cancels a connect still in
    /// flight and any scheduled reconnect. Safe to call at any time.
    pub fn disconnect(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.reconnect_attempts = 0;
        if let Some(task) = state.reconnect_task.take() {
            task.abort();
        }
        let was = state.phase;
        state.close_connection();
        state.derived.clear();
        state.identity = None;
        state.phase = Phase::Idle;
        if was != Phase::Idle {
            info!("realtime disconnected");
        }
    }
}

/// Linear backoff, saturating instead of overflowing.
pub(crate) fn backoff(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(attempt).unwrap_or(Duration::MAX)
}

/// Interest in one topic, held by the consumer that asked for it.
#[must_use = "a topic stays subscribed until the lease is released"]
#[derive(Debug)]
pub struct TopicLease {
    topic: Topic,
    inner: Weak<Inner>,
}

impl TopicLease {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn release(self) {
        if let Some(inner) = self.inner.upgrade() {
            RealtimeManager { inner }.release_topic(&self.topic);
        }
    }
}
