//! Logging setup for the theme-sync binary.
//!
//! Output goes through `tracing-subscriber` with an `EnvFilter`, either
//! human-readable or as JSON lines.

pub mod logging;

pub use logging::{init, LogFormat};
