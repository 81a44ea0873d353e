//! Collaborators the cache renders into and reports to

use crate::handles::DisplayHandle;
use crate::types::Source;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Render error: {}", self.0)
    }
}

impl std::error::Error for RenderError {}

/// Surface a background is drawn into
pub trait Container: Send {
    fn clear(&mut self);

    fn append_image(&mut self, handle: &DisplayHandle, alt: &str) -> Result<(), RenderError>;

    /// Replace the contents with an inline error state
    fn show_error(&mut self, message: &str);
}

/// Receives the credit/location line for the current background
pub trait LocationNotifier: Send + Sync {
    fn notify_location(&self, text: &str, link_url: Option<&str>, link_label: Option<&str>);
}

/// Visual hints for the page hosting the background
pub trait UiHints: Send + Sync {
    /// The previous image for `source` was released; hide it until the next
    /// one is ready instead of flashing it.
    fn suppress_stale_flash(&self, source: Source);
}

/// Notifier that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardLocation;

impl LocationNotifier for DiscardLocation {
    fn notify_location(&self, text: &str, _link_url: Option<&str>, _link_label: Option<&str>) {
        debug!(text, "Location info discarded");
    }
}

/// Hints that are only logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHints;

impl UiHints for LogHints {
    fn suppress_stale_flash(&self, source: Source) {
        debug!(source = %source, "Suppressing stale background");
    }
}
