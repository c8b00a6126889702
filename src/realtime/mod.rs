//! The `realtime` module keeps the client connected to the realtime broker.
//!
//! - `topic`: typed topic names (`class/42/assignments`, `user/7/queue/approvals`)
//! - `event`: parsing of inbound event payloads
//! - `bus`: local fan-out of parsed events to subscribers
//! - `directory`: lookup of the classes an identity belongs to
//! - `manager`: the connection manager tying it together

pub mod bus;
pub mod directory;
pub mod event;
pub mod manager;
pub mod topic;

pub use bus::{EventBus, Subscription};
pub use directory::{ClassDirectory, HttpClassDirectory};
pub use event::{ApprovalEvent, ChangeEvent, ChangeKind, EventBody, EventScope, RealtimeEvent};
pub use manager::{Identity, ManagerOptions, Phase, RealtimeManager, TopicLease};
pub use topic::Topic;
