use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

/// Console hook receiving each formatted line.
pub type ConsoleFn = fn(&str);

pub struct PrintkLogger {
    max_level: LevelFilter,
    console: Option<ConsoleFn>,
}

static LOGGER: Once<PrintkLogger> = Once::new();

impl PrintkLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            console: None,
        }
    }

    /// Echo every line to `console` in addition to the ring.
    #[must_use]
    pub const fn with_console(mut self, console: ConsoleFn) -> Self {
        self.console = Some(console);
        self
    }

    /// Install as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// Fails if a logger is already installed; the first one stays active.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        let logger: &'static Self = LOGGER.call_once(|| self);
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for PrintkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        cfg!(feature = "enabled") && metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message"
        let line = alloc::format!("[{}] {}: {}", record.level(), record.target(), record.args());
        if let Some(console) = self.console {
            console(&line);
        }
        crate::ring::append(line);
    }

    fn flush(&self) {
        // lines are complete once appended
    }
}
