//! Comment cache
//!
//! Keeps one append-only log per [`ParentKey`] built from the pages fetched so
//! far, plus the optimistic comments still waiting for the server.
//!
//! - Pages are fetched one at a time per key. A call captures its cursor
//!   before waiting for the key's fetch gate, so a duplicate call for a page
//!   that another call just loaded gets that page back instead of fetching.
//! - Confirmed comments are kept sorted by `(created_at, id)` with no
//!   duplicate ids; pending comments follow in insertion order.
//! - A change event touching a cached thread marks it stale. The next
//!   `load_page` clears the log and fetches the first page again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::comments::api::CommentApi;
use crate::comments::model::{Comment, Entry, NewComment, Page, ParentKey, PendingComment};
use crate::realtime::bus::{EventBus, Subscription};
use crate::realtime::event::RealtimeEvent;
use crate::utils::error::Result;

struct Thread {
    pages: Vec<Page>,
    confirmed: Vec<Comment>,
    pending: Vec<PendingComment>,
    next_offset: usize,
    has_more: bool,
    stale: bool,
    /// Bumped by every invalidation.
    epoch: u64,
    fetch_gate: Arc<tokio::sync::Mutex<()>>,
}

impl Thread {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            confirmed: Vec::new(),
            pending: Vec::new(),
            next_offset: 0,
            has_more: true,
            stale: false,
            epoch: 0,
            fetch_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn contains(&self, id: i64) -> bool {
        self.confirmed.iter().any(|comment| comment.id == id)
    }

    /// Insert in server order. Returns `false` if the id is already present.
    fn merge(&mut self, comment: Comment) -> bool {
        if self.contains(comment.id) {
            return false;
        }
        let at = self
            .confirmed
            .partition_point(|c| (c.created_at, c.id) <= (comment.created_at, comment.id));
        self.confirmed.insert(at, comment);
        true
    }

    fn remove_pending(&mut self, client_ref: Uuid) {
        self.pending.retain(|pending| pending.client_ref != client_ref);
    }

    fn reset(&mut self) {
        self.pages.clear();
        self.confirmed.clear();
        self.next_offset = 0;
        self.has_more = true;
    }

    fn entries(&self) -> Vec<Entry> {
        self.confirmed
            .iter()
            .cloned()
            .map(Entry::Confirmed)
            .chain(self.pending.iter().cloned().map(Entry::Pending))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Reload,
    Page(usize),
}

struct Inner {
    api: Arc<dyn CommentApi>,
    threads: Mutex<HashMap<ParentKey, Thread>>,
}

fn lock(threads: &Mutex<HashMap<ParentKey, Thread>>) -> MutexGuard<'_, HashMap<ParentKey, Thread>> {
    threads.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct CommentCache {
    inner: Arc<Inner>,
}

impl CommentCache {
    pub fn new(api: Arc<dyn CommentApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                threads: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<ParentKey, Thread>> {
        lock(&self.inner.threads)
    }

    /// Load the next page of `key`, or the first page again if the thread
    /// went stale. A zero `page_size` is treated as 1.
    pub async fn load_page(&self, key: &ParentKey, page_size: usize) -> Result<Page> {
        let page_size = page_size.max(1);
        let (cursor, gate) = {
            let mut threads = self.threads();
            let thread = threads.entry(key.clone()).or_insert_with(Thread::new);
            let cursor = if thread.stale {
                Cursor::Reload
            } else {
                Cursor::Page(thread.pages.len())
            };
            (cursor, Arc::clone(&thread.fetch_gate))
        };

        let _in_flight = gate.lock().await;

        let (reload, offset, epoch) = {
            let mut threads = self.threads();
            let thread = threads.entry(key.clone()).or_insert_with(Thread::new);
            if !thread.stale {
                let loaded = match cursor {
                    Cursor::Page(index) => thread.pages.get(index),
                    Cursor::Reload => thread.pages.first(),
                };
                if let Some(page) = loaded {
                    debug!(%key, index = page.index, "page already loaded");
                    return Ok(page.clone());
                }
                if !thread.has_more && !thread.pages.is_empty() {
                    return Ok(Page {
                        index: thread.pages.len(),
                        items: Vec::new(),
                        has_more: false,
                    });
                }
            }
            if thread.stale {
                (true, 0, thread.epoch)
            } else {
                (false, thread.next_offset, thread.epoch)
            }
        };

        let remote = self
            .inner
            .api
            .fetch_page(key, offset, page_size)
            .await?;

        let mut threads = self.threads();
        let thread = threads.entry(key.clone()).or_insert_with(Thread::new);
        if reload {
            thread.reset();
            // invalidated again while fetching: stay stale
            if thread.epoch == epoch {
                thread.stale = false;
            }
        }

        let fetched = remote.items.len();
        let mut items = Vec::with_capacity(fetched);
        for comment in remote.items {
            if thread.merge(comment.clone()) {
                items.push(comment);
            }
        }
        thread.next_offset = offset + fetched;
        thread.has_more = remote.has_more;

        let page = Page {
            index: thread.pages.len(),
            items,
            has_more: remote.has_more,
        };
        thread.pages.push(page.clone());
        debug!(
            %key,
            index = page.index,
            fetched,
            new = page.items.len(),
            has_more = page.has_more,
            "page loaded"
        );
        Ok(page)
    }

    /// Post a comment to `key`. A pending entry is visible in
    /// [`CommentCache::items`] until the server answers; it is then replaced
    /// by the stored comment, or removed on failure. Dropping the returned
    /// future also removes it.
    pub async fn create_comment(
        &self,
        key: &ParentKey,
        content: &str,
        parent_id: Option<i64>,
    ) -> Result<Comment> {
        let client_ref = Uuid::new_v4();
        self.threads()
            .entry(key.clone())
            .or_insert_with(Thread::new)
            .pending
            .push(PendingComment {
                client_ref,
                content: content.to_string(),
                parent_id,
                created_at: Utc::now(),
            });
        let mut rollback = PendingGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            client_ref,
            armed: true,
        };

        let request = NewComment {
            content: content.to_string(),
            parent_id,
        };
        match self.inner.api.create(key, &request).await {
            Ok(comment) => {
                rollback.armed = false;
                let mut threads = self.threads();
                if let Some(thread) = threads.get_mut(key) {
                    thread.remove_pending(client_ref);
                    thread.merge(comment.clone());
                }
                debug!(%key, id = comment.id, "comment confirmed");
                Ok(comment)
            }
            Err(e) => {
                warn!(%key, "failed to create comment: {e}");
                Err(e)
            }
        }
    }

    /// Mark `key` stale. Returns `false` if nothing is cached for it.
    pub fn invalidate(&self, key: &ParentKey) -> bool {
        match self.threads().get_mut(key) {
            Some(thread) => {
                thread.stale = true;
                thread.epoch += 1;
                true
            }
            None => false,
        }
    }

    /// Mark every cached thread touched by `event` stale. Returns how many.
    pub fn invalidate_for(&self, event: &RealtimeEvent) -> usize {
        let mut threads = self.threads();
        let mut count = 0;
        for (key, thread) in threads.iter_mut() {
            if key.affected_by(event) {
                thread.stale = true;
                thread.epoch += 1;
                count += 1;
                debug!(%key, topic = %event.topic, "thread invalidated");
            }
        }
        count
    }

    /// Invalidate threads on every change event broadcast on `bus`.
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let cache = self.clone();
        bus.subscribe(move |event| {
            cache.invalidate_for(event);
        })
    }

    /// Flattened log of `key`: confirmed comments, then pending ones.
    pub fn items(&self, key: &ParentKey) -> Vec<Entry> {
        self.threads()
            .get(key)
            .map(Thread::entries)
            .unwrap_or_default()
    }

    pub fn is_stale(&self, key: &ParentKey) -> bool {
        self.threads().get(key).is_some_and(|thread| thread.stale)
    }

    /// `true` until a loaded page says the thread is exhausted.
    pub fn has_more(&self, key: &ParentKey) -> bool {
        self.threads()
            .get(key)
            .is_none_or(|thread| thread.has_more)
    }
}

/// Removes a pending comment unless disarmed.
struct PendingGuard {
    inner: Arc<Inner>,
    key: ParentKey,
    client_ref: Uuid,
    armed: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(thread) = lock(&self.inner.threads).get_mut(&self.key) {
            thread.remove_pending(self.client_ref);
            debug!(key = %self.key, "pending comment rolled back");
        }
    }
}
