//! Event reporting adapter: structured log records into the host event log.
//!
//! Each record gets a category and numeric event id from an [`EventTable`].
//! Extra fields are flattened into a second string and shift the id by the
//! table's extension offset, so log readers know extended data is present.
//! Without an event source (interactive runs, non-Windows hosts) records
//! are written as `message [extension]` to a plain stream instead.

use std::fmt;
use std::io::{self, Write};
use std::iter;
use std::sync::{Arc, Mutex, PoisonError};

use log::kv::{self, Key, Value, VisitSource};
use log::{LevelFilter, Log, Metadata, Record};

use crate::error::ServiceError;

#[cfg(windows)]
mod windows_source;

#[cfg(windows)]
pub use windows_source::EventSource;

/// Record severities, including the two the `log` facade lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Debug,
        }
    }
}

/// Host event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Error,
    Warning,
    Information,
}

/// Severity → (category, event id) mapping plus the extended-data offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTable {
    pub debug: (EventCategory, u32),
    pub info: (EventCategory, u32),
    pub warn: (EventCategory, u32),
    pub error: (EventCategory, u32),
    pub fatal: (EventCategory, u32),
    pub panic: (EventCategory, u32),
    /// Added to the base id when a record carries extra fields.
    pub extension_offset: u32,
}

impl Default for EventTable {
    fn default() -> Self {
        Self {
            info: (EventCategory::Information, 1),
            warn: (EventCategory::Warning, 2),
            error: (EventCategory::Error, 3),
            debug: (EventCategory::Information, 4),
            panic: (EventCategory::Error, 5),
            fatal: (EventCategory::Error, 6),
            extension_offset: 10,
        }
    }
}

impl EventTable {
    pub fn lookup(&self, severity: Severity) -> (EventCategory, u32) {
        match severity {
            Severity::Debug => self.debug,
            Severity::Info => self.info,
            Severity::Warn => self.warn,
            Severity::Error => self.error,
            Severity::Fatal => self.fatal,
            Severity::Panic => self.panic,
        }
    }
}

/// A leveled log record with extra fields in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl EventRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// `key=value` pairs joined by single spaces; empty without fields.
    pub fn extension(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Encode as a NUL-terminated UTF-16 string.
pub fn encode_wide(s: &str) -> Result<Vec<u16>, ServiceError> {
    if s.contains('\0') {
        return Err(ServiceError::Encoding(s.to_string()));
    }
    Ok(s.encode_utf16().chain(iter::once(0)).collect())
}

/// Destination for encoded event records.
pub trait EventSink: Send + Sync {
    /// Submit one event made of 1 or 2 NUL-terminated wide strings.
    fn submit(
        &self,
        category: EventCategory,
        event_id: u32,
        strings: &[Vec<u16>],
    ) -> Result<(), ServiceError>;
}

/// Open the host event source for `name`, if this platform has one.
pub fn open_event_source(name: &str) -> Result<Option<Box<dyn EventSink>>, ServiceError> {
    #[cfg(windows)]
    return Ok(Some(Box::new(EventSource::open(name)?)));

    #[cfg(not(windows))]
    {
        log::debug!("no native event log on this platform; {name} logs to stdout");
        Ok(None)
    }
}

pub struct EventReporter {
    table: EventTable,
    sink: Option<Box<dyn EventSink>>,
    fallback: Mutex<Box<dyn Write + Send>>,
}

impl EventReporter {
    /// A reporter with the default table. `None` falls back to stdout, which
    /// stays clear of the (possibly redirected) stderr handle.
    pub fn new(sink: Option<Box<dyn EventSink>>) -> Self {
        Self {
            table: EventTable::default(),
            sink,
            fallback: Mutex::new(Box::new(io::stdout())),
        }
    }

    pub fn with_table(mut self, table: EventTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_fallback(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.fallback = Mutex::new(writer);
        self
    }

    pub fn has_event_source(&self) -> bool {
        self.sink.is_some()
    }

    pub fn report(&self, record: &EventRecord) -> Result<(), ServiceError> {
        let (category, mut event_id) = self.table.lookup(record.severity);

        let extension = record.extension();
        if !record.fields.is_empty() {
            event_id += self.table.extension_offset;
        }

        let Some(sink) = &self.sink else {
            let mut out = self
                .fallback
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            return writeln!(out, "{} [{}]", record.message, extension)
                .map_err(|e| ServiceError::io("writing log record", e));
        };

        let mut strings = vec![encode_wide(&record.message)?];
        if !extension.is_empty() {
            strings.push(encode_wide(&extension)?);
        }
        sink.submit(category, event_id, &strings)
    }
}

struct FieldCollector<'a>(&'a mut Vec<(String, String)>);

impl<'kvs> VisitSource<'kvs> for FieldCollector<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.push((key.as_str().to_string(), value.to_string()));
        Ok(())
    }
}

/// `log` facade backend that hands every record to an [`EventReporter`].
pub struct EventLogger {
    reporter: Arc<EventReporter>,
    level: LevelFilter,
}

impl EventLogger {
    pub fn new(reporter: Arc<EventReporter>, level: LevelFilter) -> Self {
        Self { reporter, level }
    }

    /// Make this the process logger. Normal log output is replaced entirely.
    pub fn install(reporter: Arc<EventReporter>, level: LevelFilter) -> Result<(), ServiceError> {
        log::set_boxed_logger(Box::new(Self::new(reporter, level)))
            .map_err(|e| ServiceError::Host(format!("installing event logger: {e}")))?;
        log::set_max_level(level);
        Ok(())
    }

    fn to_event(record: &Record<'_>) -> EventRecord {
        let mut fields = Vec::new();
        // A visitor that never fails cannot make this fail.
        let _ = record
            .key_values()
            .visit(&mut FieldCollector(&mut fields));
        EventRecord {
            severity: record.level().into(),
            message: record.args().to_string(),
            fields,
        }
    }
}

impl Log for EventLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere left to report a failure to report.
        let _ = self.reporter.report(&Self::to_event(record));
    }

    fn flush(&self) {
        if self.reporter.sink.is_none() {
            let _ = self
                .reporter
                .fallback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush();
        }
    }
}

/// Report panics as Panic events, then run the previously installed hook.
pub fn install_panic_reporter(reporter: Arc<EventReporter>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = reporter.report(&EventRecord::new(Severity::Panic, info.to_string()));
        previous(info);
    }));
}
