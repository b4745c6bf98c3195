#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scoring;
pub mod selection;
pub mod time;

pub use error::Error;
pub use time::Clock;

/// Maximum number of session results kept per skill.
pub const SESSION_HISTORY_CAP: usize = 20;

/// Delay before the feedback panel advances on its own.
pub const DEFAULT_AUTO_ADVANCE_MS: u64 = 2_000;
