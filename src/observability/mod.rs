//! # Observability
//!
//! Observability modules for the sync run.
//!
//! - `logging`: tracing subscriber setup (text or json output)

pub mod logging;

// Re-export for convenience
pub use logging::*;
