//! Panic recovery: log the in-flight panic as one JSON line, then exit
//!
//! A [`RecoverGuard`] placed at the top of an entry point or request handler
//! turns an unhandled panic into a final `{"Message", "Error", "Stack"}` (error
//! payloads) or `{"Error", "Stack"}` (anything else) record followed by
//! `process::exit(1)`. Execution never resumes past a recovered panic.
//!
//! The payload and backtrace are captured by a panic hook at the panic site,
//! because by the time the guard drops the panicking frames are gone.

use super::error::LoggerError;
use super::output::Output;
use super::record::ErrorReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Once;
use std::{io, panic, process, thread};

/// Exit status after a recovered panic has been written
pub const EXIT_STATUS: i32 = 1;

const UNKNOWN_PANIC: &str = "Unknown panic";

static HOOK: Once = Once::new();

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

/// The record written for a recovered panic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanicRecord {
    /// Error message, present only for error payloads
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(rename = "Error")]
    pub error: Value,

    #[serde(rename = "Stack")]
    pub stack: String,
}

impl PanicRecord {
    /// Classify a panic payload.
    ///
    /// `LoggerError`, `Box<dyn Error + Send + Sync>`, `io::Error` and
    /// `ErrorReport` payloads are errors. `&str`, `String` and
    /// `serde_json::Value` payloads are emitted as-is under `Error`.
    pub fn from_payload(payload: &(dyn Any + Send), stack: impl Into<String>) -> Self {
        match error_payload(payload) {
            Some(report) => Self {
                message: Some(report.message.clone()),
                error: report.to_json_value(),
                stack: stack.into(),
            },
            None => Self {
                message: None,
                error: raw_payload(payload),
                stack: stack.into(),
            },
        }
    }

    /// Record for a panic whose payload was never seen by the hook
    pub fn unknown(stack: impl Into<String>) -> Self {
        Self {
            message: None,
            error: Value::String(UNKNOWN_PANIC.to_string()),
            stack: stack.into(),
        }
    }
}

fn error_payload(payload: &(dyn Any + Send)) -> Option<ErrorReport> {
    if let Some(err) = payload.downcast_ref::<LoggerError>() {
        Some(ErrorReport::new(err))
    } else if let Some(err) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        Some(ErrorReport::new(&**err))
    } else if let Some(err) = payload.downcast_ref::<io::Error>() {
        Some(ErrorReport::new(err))
    } else {
        payload.downcast_ref::<ErrorReport>().cloned()
    }
}

fn raw_payload(payload: &(dyn Any + Send)) -> Value {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Value::String((*s).to_string())
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Value::String(s.clone())
    } else if let Some(value) = payload.downcast_ref::<Value>() {
        value.clone()
    } else {
        Value::String(UNKNOWN_PANIC.to_string())
    }
}

/// Install the capturing panic hook in front of the current one.
///
/// Idempotent. Called by [`Output::recover_guard`]; call it directly only if
/// the application replaces hooks and wants to control the order. On threads
/// with a live guard the panic is stashed for the guard before the previous
/// hook runs. The previous hook sees every panic either way, including ones a
/// nested `catch_unwind` later handles.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let stack = Backtrace::force_capture().to_string();
                let record = PanicRecord::from_payload(info.payload(), stack);
                PENDING.with(|pending| *pending.borrow_mut() = Some(record));
            }
            previous(info);
        }));
    });
}

/// Writes the in-flight panic and exits the process when dropped during
/// unwinding. Does nothing, and takes no lock, when dropped normally.
#[must_use = "panics are only recovered while the guard is alive"]
pub struct RecoverGuard<'a> {
    output: &'a Output,
    // Guard depth is per thread
    _not_send: PhantomData<*const ()>,
}

impl<'a> RecoverGuard<'a> {
    pub(crate) fn new(output: &'a Output) -> Self {
        install_panic_hook();
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));

        Self {
            output,
            _not_send: PhantomData,
        }
    }
}

impl Drop for RecoverGuard<'_> {
    fn drop(&mut self) {
        let depth = GUARD_DEPTH.with(|depth| {
            let remaining = depth.get().saturating_sub(1);
            depth.set(remaining);
            remaining
        });

        if !thread::panicking() {
            if depth == 0 {
                // Left behind by a panic that was caught below the guard
                PENDING.with(|pending| *pending.borrow_mut() = None);
            }
            return;
        }

        let record = PENDING
            .with(|pending| pending.borrow_mut().take())
            .unwrap_or_else(|| PanicRecord::unknown(Backtrace::force_capture().to_string()));

        self.output.write_panic(&record);
        process::exit(EXIT_STATUS);
    }
}
