//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `classlink` crate.
//!
//! It centralizes the error type every layer returns and the logging setup
//! shared by the binary and the tests.

pub mod error;
pub mod logging;

pub use error::{ApiError, ClientError};
