//! Structured logging for the FocusMate companion engine.
//!
//! Handles secret redaction, console plus rolling JSON file output, and
//! per-turn conversation event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{TurnEvent, TurnEventEntry, TurnEventLogger};
pub use logger::{init_logger, LOG_FILE_PREFIX};
pub use redact::{redact_sensitive_data, truncate_chars};
