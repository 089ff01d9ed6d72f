// Run log written next to each deposition.
//
// The caller creates one `RunLog` and hands it to every operation, so
// nothing in the library configures logging globally. Entries are also
// forwarded to `tracing` for the console.

use chrono::Local;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

pub struct RunLog {
    out: Box<dyn Write + Send>,
}

impl RunLog {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(out: impl Write + Send + 'static) -> Self {
        RunLog { out: Box::new(out) }
    }

    /// A log kept in memory; the returned buffer can be read back.
    pub fn in_memory() -> (Self, MemoryLog) {
        let buf = MemoryLog::default();
        (Self::from_writer(buf.clone()), buf)
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.write(Level::Warning, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref());
    }

    fn write(&mut self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warning => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{} - [{}]: {}\n", stamp, level, message);
        // A log that can no longer be written must not abort the deposit.
        if let Err(e) = self.out.write_all(line.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "failed to write run log");
        }
    }
}

/// Shared in-memory sink behind `RunLog::in_memory`.
#[derive(Clone, Default)]
pub struct MemoryLog(Arc<Mutex<Vec<u8>>>);

impl MemoryLog {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for MemoryLog {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Size as reported in the run log.
pub fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: u64 = 1024 * 1024 * 1024;
    if bytes < GIB {
        format!("{:.2} MB.", bytes as f64 / MIB)
    } else {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_have_timestamp_and_level() {
        let (mut log, buf) = RunLog::in_memory();
        log.info("created");
        log.warn("dry run");
        log.error("failed");

        let contents = buf.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - [INFO]: created"));
        assert!(lines[1].ends_with(" - [WARNING]: dry run"));
        assert!(lines[2].ends_with(" - [ERROR]: failed"));
        // "YYYY-MM-DD HH:MM:SS"
        assert_eq!(lines[0].find(" - [").unwrap(), 19);
    }

    #[test]
    fn file_log_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deposition.log");
        let mut log = RunLog::create(&path).unwrap();
        log.info("hello");
        drop(log);
        assert!(std::fs::read_to_string(&path).unwrap().contains("[INFO]: hello"));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0.00 MB.");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB.");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.50 GB");
    }
}
