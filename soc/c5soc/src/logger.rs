// =============================================================================
// DUET - UART Logger
// =============================================================================
// `log` backend writing `[LEVEL] message` lines to the console.
// =============================================================================

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};

use crate::console;

pub struct UartLogger;

static LOGGER: UartLogger = UartLogger;

impl Log for UartLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        console::_print(format_args!("{}", Line(record)));
    }

    fn flush(&self) {
        console::flush();
    }
}

/// One formatted log line, newline included.
struct Line<'a, 'b>(&'a Record<'b>);

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        write!(f, "[{:<5}] ", record.level())?;
        if cfg!(feature = "log-location") {
            if let (Some(file), Some(line)) = (record.file(), record.line()) {
                write!(f, "{file}:{line}: ")?;
            }
        }
        f.write_fmt(*record.args())?;
        f.write_char('\n')
    }
}

/// Install the logger. Only the first call has any effect.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// `Trace` in debug builds, `Info` otherwise.
pub const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    }
}
