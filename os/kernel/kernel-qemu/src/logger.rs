use crate::qemu_fmt::QemuSink;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install this logger as the global `log` backend. Call once during early init.
    ///
    /// # Errors
    /// If a logger was already installed.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Format `record` as one line: `[LEVEL] target: message\n`.
    fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
        writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = Self::write_record(&mut QemuSink, record);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn filters_by_level() {
        let logger = QemuLogger::new(LevelFilter::Info);
        let meta = |level| Metadata::builder().level(level).target("kvmplat").build();
        assert!(logger.enabled(&meta(Level::Error)));
        assert!(logger.enabled(&meta(Level::Info)));
        assert!(!logger.enabled(&meta(Level::Debug)));
    }

    #[test]
    fn formats_level_target_and_message() {
        let mut out = String::new();
        QemuLogger::write_record(
            &mut out,
            &Record::builder()
                .level(Level::Warn)
                .target("kernel_boot::cmdline")
                .args(format_args!("truncated to {} bytes", 8191))
                .build(),
        )
        .unwrap();
        assert_eq!(out, "[WARN] kernel_boot::cmdline: truncated to 8191 bytes\n");
    }
}
