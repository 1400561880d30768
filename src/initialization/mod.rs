//! Process-level initialization.
//!
//! Only logging lives here: connections to the stores are owned by whoever
//! constructs the backend clients.

mod logger;

// Re-export public API
pub use logger::init_logger_with;
