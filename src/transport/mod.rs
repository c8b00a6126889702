//! The `transport` module handles network communication with the backend.
//!
//! `http` wraps REST calls; `websocket` opens the realtime connection and
//! `message` defines the frames exchanged over it.

pub mod http;
pub mod message;
pub mod websocket;

pub use http::ApiClient;
pub use message::{ClientFrame, ServerFrame};
pub use websocket::{Connector, Link, WebsocketConnector};
