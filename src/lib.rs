//! # Rust JSON Lines Logger
//!
//! A minimal structured logger that writes one JSON object per line to
//! standard output.
//!
//! ## Features
//!
//! - **Any serializable value**: strings become `Message`, objects are merged,
//!   everything else is nested under `Item`
//! - **Caller location**: every record carries `File` (`path:line`) of the call site
//! - **Log and exit on panic**: a recover guard writes the panic with its stack
//!   trace as a final record, then exits with status 1
//! - **Thread safe**: one lock per output, lines never interleave
//!
//! ## Example
//!
//! ```no_run
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Request<'a> {
//!     #[serde(rename = "Path")]
//!     path: &'a str,
//!     #[serde(rename = "Status")]
//!     status: u16,
//! }
//!
//! fn main() {
//!     rust_jsonl_logger::recover(|| {
//!         rust_jsonl_logger::json("Server started");
//!         // {"File":"src/main.rs:15","Message":"Server started"}
//!
//!         rust_jsonl_logger::json(&Request { path: "/health", status: 200 });
//!         // {"File":"src/main.rs:18","Path":"/health","Status":200}
//!     });
//! }
//! ```

pub mod core;

use serde::Serialize;
use std::error::Error;
use std::sync::OnceLock;

pub mod prelude {
    pub use crate::core::{
        ErrorReport, LoggerError, Output, OutputBuilder, OutputGuard, OutputMetrics, PanicRecord,
        RecoverGuard, Result,
    };
    pub use crate::{json, json_error, output, recover, recover_guard};
}

pub use crate::core::{
    install_panic_hook, ErrorReport, LoggerError, Output, OutputBuilder, OutputGuard,
    OutputMetrics, PanicRecord, Record, RecoverGuard, Result, EXIT_STATUS,
};

static STDOUT: OnceLock<Output> = OnceLock::new();

/// The process-wide standard output handle.
///
/// Lock it to write to stdout by other means without interleaving with records.
pub fn output() -> &'static Output {
    STDOUT.get_or_init(Output::stdout)
}

/// Log one value to standard output. See [`Output::json`].
#[track_caller]
pub fn json<T: Serialize + ?Sized>(value: &T) {
    output().json(value);
}

/// See [`Output::try_json`]
#[track_caller]
pub fn try_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    output().try_json(value)
}

/// Log an error to standard output. See [`Output::json_error`].
#[track_caller]
pub fn json_error<E: Error + ?Sized>(err: &E) {
    output().json_error(err);
}

/// See [`Output::try_json_error`]
#[track_caller]
pub fn try_json_error<E: Error + ?Sized>(err: &E) -> Result<()> {
    output().try_json_error(err)
}

/// Recover panics in the current scope to standard output. See [`Output::recover_guard`].
pub fn recover_guard() -> RecoverGuard<'static> {
    output().recover_guard()
}

/// Run `f`, logging any panic to standard output and exiting with status 1
pub fn recover<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    output().recover(f)
}
