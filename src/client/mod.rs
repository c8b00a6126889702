//! The `client` module wires the services of `classlink` together.
//!
//! [`Classlink`] is the composition root: it owns the one realtime manager
//! of the process and hands the other services their dependencies.

pub mod classlink;
pub use classlink::Classlink;

#[cfg(test)]
mod tests;
