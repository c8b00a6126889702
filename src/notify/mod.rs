//! The `notify` module turns realtime events into de-duplicated toasts.
//!
//! - `toast`: the toast record, its dedup key and click route
//! - `center`: the visible set, expiry and the presenter seam

pub mod center;
pub mod toast;

pub use center::{HideReason, LogPresenter, Presenter, ToastCenter};
pub use toast::{Toast, ToastLevel, dedup_key, route_for};

#[cfg(test)]
mod tests;
