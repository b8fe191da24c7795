// Licensed under the Apache-2.0 license

//! Crate-wide logging support.
//!
//! Drivers are generic over a [`Logger`] so that production builds can route
//! diagnostics to a UART (or drop them entirely) without the driver knowing
//! which. Loggers take `&self` because they are shared between concurrent
//! callers and interrupt handlers.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_io::Write as _;

/// Severity of a log record
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Debug => "DBG",
            Level::Error => "ERR",
        }
    }
}

pub trait Logger {
    /// Emit one record.
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Logger that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Logger writing one line per record to an `embedded_io::Write` sink,
/// typically a UART.
///
/// Records from different contexts are serialized through an internal spin
/// lock that is never waited on: a record arriving while another one is being
/// written (an interrupt handler preempting a thread mid-record) is dropped
/// and counted in [`WriterLogger::dropped`]. Write errors are ignored; logging
/// must never fail a bus operation.
pub struct WriterLogger<W> {
    sink: spin::Mutex<W>,
    min_level: Level,
    dropped: AtomicU32,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub const fn new(sink: W) -> Self {
        Self {
            sink: spin::Mutex::new(sink),
            min_level: Level::Debug,
            dropped: AtomicU32::new(0),
        }
    }

    /// Only emit records at `Level::Error`.
    #[must_use]
    pub fn errors_only(mut self) -> Self {
        self.min_level = Level::Error;
        self
    }

    /// Records lost because the sink was busy.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Give the sink back.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if level == Level::Debug && self.min_level == Level::Error {
            return;
        }
        let Some(mut sink) = self.sink.try_lock() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let _ = write!(sink, "[{}] {}\r\n", level.prefix(), args);
    }
}
