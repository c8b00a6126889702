//! Notification center
//!
//! Consumes broadcast events and decides which ones become visible toasts.
//! A toast is keyed by [`dedup_key`]; while a toast with that key is visible,
//! further arrivals of the same key are dropped. Toasts expire after the
//! display duration or when dismissed, after which the key may show again.
//!
//! Expiry is enforced twice: a timer task hides the toast on time, and every
//! read purges entries whose deadline passed, so correctness does not depend
//! on the timer having run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::NotificationSettings;
use crate::navigation::Navigator;
use crate::notify::toast::{Toast, dedup_key};
use crate::realtime::bus::{EventBus, Subscription};
use crate::realtime::event::RealtimeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    Expired,
    Dismissed,
}

/// Renders toasts. Implementations must not block.
pub trait Presenter: Send + Sync {
    fn show(&self, toast: &Toast);
    fn hide(&self, toast: &Toast, reason: HideReason);
}

/// Writes toasts to the log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn show(&self, toast: &Toast) {
        info!(
            key = %toast.key,
            level = ?toast.level,
            route = toast.route.as_deref().unwrap_or("-"),
            "{}: {}",
            toast.title,
            toast.message
        );
    }

    fn hide(&self, toast: &Toast, reason: HideReason) {
        debug!(key = %toast.key, ?reason, "toast hidden");
    }
}

struct CenterInner {
    display: Duration,
    presenter: Arc<dyn Presenter>,
    navigator: Arc<dyn Navigator>,
    active: Mutex<HashMap<String, Toast>>,
}

#[derive(Clone)]
pub struct ToastCenter {
    inner: Arc<CenterInner>,
}

impl ToastCenter {
    pub fn new(
        display: Duration,
        presenter: Arc<dyn Presenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(CenterInner {
                display,
                presenter,
                navigator,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn from_settings(
        settings: &NotificationSettings,
        presenter: Arc<dyn Presenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::new(
            Duration::from_secs(settings.display_secs),
            presenter,
            navigator,
        )
    }

    fn active_toasts(&self) -> MutexGuard<'_, HashMap<String, Toast>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed every event broadcast on `bus` into this center.
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let center = self.clone();
        bus.subscribe(move |event| {
            center.offer(event);
        })
    }

    /// Show a toast for `event` unless one with the same key is visible.
    /// Returns the toast that was shown.
    pub fn offer(&self, event: &RealtimeEvent) -> Option<Toast> {
        let now = Instant::now();
        let key = dedup_key(event);

        let (expired, shown) = {
            let mut active = self.active_toasts();
            let expired = purge_expired(&mut active, now);
            if active.contains_key(&key) {
                debug!(%key, "duplicate notification suppressed");
                (expired, None)
            } else {
                let toast = Toast::from_event(event, now, expiry(now, self.inner.display));
                active.insert(key, toast.clone());
                (expired, Some(toast))
            }
        };

        self.hide_all(&expired, HideReason::Expired);
        if let Some(toast) = &shown {
            self.inner.presenter.show(toast);
            self.schedule_expiry(toast);
        }
        shown
    }

    fn schedule_expiry(&self, toast: &Toast) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let key = toast.key.clone();
        let id = toast.id;
        let deadline = toast.expires_at;
        handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                ToastCenter { inner }.expire(&key, id);
            }
        });
    }

    fn expire(&self, key: &str, id: Uuid) {
        let removed = {
            let mut active = self.active_toasts();
            match active.get(key) {
                Some(toast) if toast.id == id => active.remove(key),
                _ => None,
            }
        };
        if let Some(toast) = removed {
            self.inner.presenter.hide(&toast, HideReason::Expired);
        }
    }

    fn hide_all(&self, toasts: &[Toast], reason: HideReason) {
        for toast in toasts {
            self.inner.presenter.hide(toast, reason);
        }
    }

    /// Close the toast with `key` now. Returns whether one was visible.
    pub fn dismiss(&self, key: &str) -> bool {
        let removed = self.active_toasts().remove(key);
        match removed {
            Some(toast) => {
                self.inner.presenter.hide(&toast, HideReason::Dismissed);
                true
            }
            None => false,
        }
    }

    /// Navigate to the route of the toast with `key`. The toast stays visible
    /// until it expires; navigation failures are only logged.
    pub fn click(&self, key: &str) -> bool {
        let Some(toast) = self.active().into_iter().find(|toast| toast.key == key) else {
            return false;
        };

        if let Some(route) = toast.route.as_deref() {
            if let Err(e) = self.inner.navigator.navigate(route) {
                warn!(%key, %route, "navigation from notification failed: {e}");
            }
        }
        true
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.active().iter().any(|toast| toast.key == key)
    }

    /// Visible toasts, oldest first.
    pub fn active(&self) -> Vec<Toast> {
        let (expired, mut visible) = {
            let mut active = self.active_toasts();
            let expired = purge_expired(&mut active, Instant::now());
            (expired, active.values().cloned().collect::<Vec<_>>())
        };
        self.hide_all(&expired, HideReason::Expired);
        visible.sort_by_key(|toast| toast.shown_at);
        visible
    }
}

/// Roughly 30 years; stands in for a display time too large to add.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn expiry(now: Instant, display: Duration) -> Instant {
    now.checked_add(display)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

fn purge_expired(active: &mut HashMap<String, Toast>, now: Instant) -> Vec<Toast> {
    let keys: Vec<String> = active
        .iter()
        .filter(|(_, toast)| toast.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect();
    keys.into_iter()
        .filter_map(|key| active.remove(&key))
        .collect()
}
