//! Input source abstraction for receiving raw status words.
//!
//! A source is chosen once at start-up: a live device channel when one is
//! configured and reachable, otherwise manual entry. The ingestion poller
//! only polls live sources; manual tokens arrive through
//! [`IngestHandle`](crate::ingest::IngestHandle) from the foreground.

mod device;
mod manual;

pub use device::DeviceSource;
pub use manual::ManualSource;

use std::fmt::Debug;

/// Trait for receiving raw tokens from various sources.
///
/// # Example
///
/// ```
/// use faultwatch::{InputSource, ManualSource};
///
/// let mut source = ManualSource::new();
/// assert!(!source.is_live());
/// assert!(source.poll().is_none());
/// ```
pub trait InputSource: Send + Debug {
    /// Take the next raw token, if one is available.
    ///
    /// This method must not block.
    fn poll(&mut self) -> Option<String>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI header.
    fn description(&self) -> &str;

    /// The last error the source ran into, if it is currently unhealthy.
    fn error(&self) -> Option<String>;

    /// Whether the source produces tokens on its own and should be polled.
    fn is_live(&self) -> bool {
        true
    }
}
