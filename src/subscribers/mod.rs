//! Built-in consumers of the event bus.
//!
//! - [`LogWriter`] writes every received event through `tracing` (feature `logging`).

mod log;

pub use log::LogWriter;
