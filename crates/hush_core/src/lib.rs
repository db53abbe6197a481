pub mod error;
pub mod logging;

pub use error::{ErrorCategory, ExitStatus};
pub use logging::{DEFAULT_FILTER, LogGuard, init_logging};
