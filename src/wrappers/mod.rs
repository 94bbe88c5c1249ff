//! Decorator wrappers: structural ops that wrap another op and add one
//! concern each (logging, timeout, validation).

pub mod logging;
pub mod timeout;
pub mod validating;

pub use logging::LoggingWrapper;
pub use timeout::{time_bound_with_logging, TimeBoundWrapper};
pub use validating::ValidatingWrapper;
