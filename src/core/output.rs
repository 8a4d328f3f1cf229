//! Lock-guarded output stream shared by the encoder and the recoverer
//!
//! Every write path takes the same lock, so records from concurrent callers
//! come out as complete lines in some total order.

use super::error::{LoggerError, Result};
use super::metrics::OutputMetrics;
use super::record;
use super::recover::{PanicRecord, RecoverGuard};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;

enum Sink {
    Stdout(io::Stdout),
    Writer(Box<dyn Write + Send>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(stdout) => stdout.write(buf),
            Sink::Writer(writer) => writer.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stdout(stdout) => stdout.lock().write_all(buf),
            Sink::Writer(writer) => writer.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(stdout) => stdout.flush(),
            Sink::Writer(writer) => writer.flush(),
        }
    }
}

/// A JSON Lines output stream and the lock that serializes writes to it.
///
/// Records are written unbuffered: each call serializes one object, appends
/// `\n`, writes it with a single `write_all` and flushes.
///
/// # Example
///
/// ```
/// use rust_jsonl_logger::Output;
///
/// let output = Output::stdout();
/// output.json("Server started");
/// output.json(&vec![1, 2, 3]);
/// ```
pub struct Output {
    sink: Mutex<Sink>,
    caller_location: bool,
    metrics: OutputMetrics,
}

impl Output {
    /// Output writing to the process's standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::builder().build()
    }

    /// Output writing to an arbitrary writer
    #[must_use]
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::builder().writer(writer).build()
    }

    #[must_use]
    pub fn builder() -> OutputBuilder {
        OutputBuilder::new()
    }

    /// Acquire the output lock.
    ///
    /// Code that writes to the same stream by other means should write through
    /// the returned guard so its output never interleaves with records.
    pub fn lock(&self) -> OutputGuard<'_> {
        OutputGuard {
            sink: self.sink.lock(),
        }
    }

    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }

    /// Log one value as a JSON Lines record tagged with the caller's location.
    ///
    /// See [`record`](super::record) for how the value maps to fields.
    ///
    /// # Panics
    ///
    /// Panics with a [`LoggerError`] payload if the value cannot be serialized
    /// or the record cannot be written.
    #[track_caller]
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        if let Err(err) = self.try_json(value) {
            std::panic::panic_any(err);
        }
    }

    /// Like [`json`](Self::json), returning failures instead of panicking
    #[track_caller]
    pub fn try_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut sink = self.sink.lock();
        let location = self.caller_location();

        match record::value_record(location, value) {
            Ok(record) => self.write_line(&mut sink, &record),
            Err(err) => {
                self.metrics.record_failure();
                Err(err)
            }
        }
    }

    /// Log an error as `{"File", "Message", "Error"}`.
    ///
    /// # Panics
    ///
    /// Panics with a [`LoggerError`] payload if the record cannot be written.
    #[track_caller]
    pub fn json_error<E: Error + ?Sized>(&self, err: &E) {
        if let Err(write_err) = self.try_json_error(err) {
            std::panic::panic_any(write_err);
        }
    }

    /// Like [`json_error`](Self::json_error), returning failures instead of panicking
    #[track_caller]
    pub fn try_json_error<E: Error + ?Sized>(&self, err: &E) -> Result<()> {
        let mut sink = self.sink.lock();
        let location = self.caller_location();

        let record = record::error_record(location, err);
        self.write_line(&mut sink, &record)
    }

    /// Recover panics unwinding through the current scope.
    ///
    /// While the guard is alive, a panic on this thread is written to this
    /// output as `{"Message", "Error", "Stack"}` or `{"Error", "Stack"}` when
    /// the guard drops, and the process exits with status 1.
    ///
    /// ```no_run
    /// use rust_jsonl_logger::Output;
    ///
    /// let output = Output::stdout();
    /// let _guard = output.recover_guard();
    /// panic!("unreachable state");
    /// ```
    pub fn recover_guard(&self) -> RecoverGuard<'_> {
        RecoverGuard::new(self)
    }

    /// Run `f` under a [`RecoverGuard`] and return its value
    pub fn recover<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.recover_guard();
        f()
    }

    pub(crate) fn write_panic(&self, record: &PanicRecord) {
        let mut sink = self.sink.lock();
        self.metrics.record_panic();

        if let Err(err) = self.write_line(&mut sink, record) {
            eprintln!("[LOGGER CRITICAL] Failed to write panic record: {}", err);
        }
    }

    #[track_caller]
    fn caller_location(&self) -> Option<&'static Location<'static>> {
        if self.caller_location {
            Some(Location::caller())
        } else {
            None
        }
    }

    fn write_line<S: Serialize + ?Sized>(&self, sink: &mut Sink, record: &S) -> Result<()> {
        let result = encode_line(record).and_then(|line| {
            sink.write_all(&line)
                .and_then(|()| sink.flush())
                .map_err(|err| LoggerError::io_operation("writing record", err))?;
            Ok(line.len())
        });

        match result {
            Ok(bytes) => {
                self.metrics.record_written(bytes);
                Ok(())
            }
            Err(err) => {
                self.metrics.record_failure();
                Err(err)
            }
        }
    }
}

fn encode_line<S: Serialize + ?Sized>(record: &S) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("caller_location", &self.caller_location)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to an [`Output`] stream, released on drop
pub struct OutputGuard<'a> {
    sink: MutexGuard<'a, Sink>,
}

impl Write for OutputGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.sink.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Builder for [`Output`]
///
/// # Example
///
/// ```
/// use rust_jsonl_logger::Output;
///
/// let output = Output::builder()
///     .writer(std::io::sink())
///     .caller_location(false)
///     .build();
/// output.json("no File field on this record");
/// ```
pub struct OutputBuilder {
    sink: Option<Sink>,
    caller_location: bool,
}

impl OutputBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: None,
            caller_location: true,
        }
    }

    /// Write records to `writer` instead of standard output
    #[must_use]
    pub fn writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.sink = Some(Sink::Writer(Box::new(writer)));
        self
    }

    /// Tag encoder records with a `File` field (default: on)
    #[must_use]
    pub fn caller_location(mut self, enabled: bool) -> Self {
        self.caller_location = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Output {
        Output {
            sink: Mutex::new(self.sink.unwrap_or_else(|| Sink::Stdout(io::stdout()))),
            caller_location: self.caller_location,
            metrics: OutputMetrics::new(),
        }
    }
}

impl Default for OutputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OutputBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuilder")
            .field("caller_location", &self.caller_location)
            .finish_non_exhaustive()
    }
}
