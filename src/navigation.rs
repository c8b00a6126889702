//! Navigation seam.
//!
//! The core never renders pages; when it needs to move the user somewhere
//! (a clicked notification, a forced sign-out) it asks a [`Navigator`].

use tracing::info;

use crate::utils::error::Result;

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str) -> Result<()>;
}

/// Writes the requested route to the log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) -> Result<()> {
        info!(route, "navigate");
        Ok(())
    }
}
