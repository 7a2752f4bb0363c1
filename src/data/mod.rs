//! Readings, classification and the rolling window.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "1s", "500ms")
//! - [`reading`]: The [`Reading`] model and the status evaluator ([`evaluate`])
//! - [`window`]: Bounded most-recent view used by the UI ([`RollingWindow`])
//!
//! ## Data Flow
//!
//! ```text
//! raw token ("0010")
//!        │
//!        ▼
//! evaluate()  ──▶ ValidationError (rejected, never stored)
//!        │
//!        ▼
//! Reading (Normal | Faulty)
//!        │
//!        ├──▶ EventLog::append() (durable)
//!        │
//!        └──▶ RollingWindow::push() (for the table and timeline)
//! ```

pub mod duration;
pub mod reading;
pub mod window;

pub use reading::{evaluate, Classification, Reading, TIMESTAMP_FORMAT};
pub use window::{RollingWindow, DEFAULT_WINDOW_SIZE};
