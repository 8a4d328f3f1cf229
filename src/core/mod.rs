//! Core logger types

pub mod error;
pub mod metrics;
pub mod output;
pub mod record;
pub mod recover;

pub use error::{LoggerError, Result};
pub use metrics::OutputMetrics;
pub use output::{Output, OutputBuilder, OutputGuard};
pub use record::{ErrorReport, Record};
pub use recover::{install_panic_hook, PanicRecord, RecoverGuard, EXIT_STATUS};
