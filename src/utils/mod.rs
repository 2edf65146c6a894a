//! Utility modules
//!
//! Logging setup and timing helpers shared across the crate.

pub mod logger;
pub mod timer;

pub use logger::{init_logger, LogLevel};
pub use timer::Timer;
