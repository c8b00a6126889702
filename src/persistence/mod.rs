//! The `persistence` module keeps client-side state across restarts.
//!
//! Two stores share one `sled` database: the session (access token and the
//! signed-in user's profile) and in-progress edit drafts.

pub mod pairs;
pub mod sled_store;

pub use sled_store::{Draft, DraftStore, Persistence, SessionStore, UserProfile};

#[cfg(test)]
mod tests;
