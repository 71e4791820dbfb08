use crate::trace::Trace;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `[LEVEL] target: message` lines to the sinks.
#[derive(Debug)]
pub struct KernelLogger {
    max_level: LevelFilter,
}

impl KernelLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Initialize the sinks and install `self` as the global logger.
    ///
    /// # Errors
    /// If a logger was already installed.
    ///
    /// # Safety
    /// Ring 0. Call once, before interrupts are enabled.
    pub unsafe fn init(&'static self) -> Result<(), SetLoggerError> {
        unsafe { crate::trace::init() };
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

/// `[LEVEL] target: message\n`
///
/// # Errors
/// Whatever `out` returns.
pub fn format_record(out: &mut impl fmt::Write, record: &Record<'_>) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = format_record(&mut Trace, record);
    }

    fn flush(&self) {}
}
