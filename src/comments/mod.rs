//! The `comments` module caches paginated comment threads.
//!
//! - `model`: thread keys, comments and pages
//! - `api`: the remote side, `HttpCommentApi` over the REST client
//! - `cache`: per-thread logs with optimistic creation and invalidation

pub mod api;
pub mod cache;
pub mod model;

pub use api::{CommentApi, HttpCommentApi};
pub use cache::CommentCache;
pub use model::{Comment, Entry, NewComment, Page, ParentKey, PendingComment, RemotePage};
