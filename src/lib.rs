//! # Classlink
//!
//! `classlink` is the client core of a learning-management front end. It keeps
//! a single realtime connection to the backend broker, turns the events it
//! receives into de-duplicated notifications, and caches paginated comment
//! threads with optimistic posting.
//!
//! ## Core Modules
//!
//! - `realtime`: the connection manager, topic registry and event bus.
//! - `notify`: notification de-duplication and expiry.
//! - `comments`: the paginated, threaded comment cache.
//! - `transport`: the REST client and the WebSocket connector.
//! - `persistence`: session and draft storage in `sled`.
//! - `config`: configuration loading.
//! - `navigation`: the seam used to move the user to another page.
//! - `client`: the composition root wiring everything together.
//! - `utils`: error handling and logging.

pub mod client;
pub mod comments;
pub mod config;
pub mod navigation;
pub mod notify;
pub mod persistence;
pub mod realtime;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use client::Classlink;
pub use utils::error::{ApiError, ClientError, Result};
