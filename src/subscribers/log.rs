//! Append-only diagnostic log with wholesale rotation.
//!
//! [`DiagnosticLog`] is the supervisor's line-oriented log file. When the
//! file grows past a fixed size threshold it is rotated *wholesale* to a
//! `.old` sibling (replacing any previous one) and a fresh file is started —
//! there is no multi-generation rotation.
//!
//! Every write failure is swallowed: logging must never be a cause of
//! application failure, and shutdown must not block on a full disk.
//!
//! Line format follows the sidecars' own logs:
//! ```text
//! 2026-01-16T20:30:00.123Z - INFO - [price-list] handshake complete
//! ```
//!
//! [`LogWriter`] is the bundled [`Subscribe`] implementation that renders
//! lifecycle events into this log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Open file plus the byte count written so far.
struct LogFile {
    file: File,
    written: u64,
}

/// Shared, size-capped diagnostic log.
///
/// Cheap to share via `Arc`; writes take a short `std::sync::Mutex` critical
/// section (append + occasional rename).
pub struct DiagnosticLog {
    path: PathBuf,
    max_bytes: u64,
    inner: Mutex<Option<LogFile>>,
}

impl DiagnosticLog {
    /// Creates a log that appends to `path` and rotates once the file
    /// exceeds `max_bytes`. The file is opened lazily on first write.
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes: max_bytes.max(1),
            inner: Mutex::new(None),
        }
    }

    /// Appends one INFO line scoped to `scope`.
    pub fn info(&self, scope: &str, msg: impl AsRef<str>) {
        self.append("INFO", scope, msg.as_ref());
    }

    /// Appends one WARNING line scoped to `scope`.
    pub fn warn(&self, scope: &str, msg: impl AsRef<str>) {
        self.append("WARNING", scope, msg.as_ref());
    }

    /// Appends a formatted line; all I/O failures are swallowed.
    pub fn append(&self, level: &str, scope: &str, msg: &str) {
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let line = format!("{stamp} - {level} - [{scope}] {msg}\n");

        // A poisoned lock means a writer panicked mid-append; the log is
        // best-effort, so just take the data and keep going.
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        if guard.is_none() {
            *guard = self.open_file();
        }
        let Some(lf) = guard.as_mut() else { return };

        if lf.file.write_all(line.as_bytes()).is_err() {
            return;
        }
        lf.written += line.len() as u64;

        if lf.written > self.max_bytes {
            *guard = None;
            let _ = std::fs::rename(&self.path, self.old_path());
        }
    }

    /// Sibling path the log is rotated to (`<path>.old`).
    pub fn old_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".old");
        PathBuf::from(os)
    }

    fn open_file(&self) -> Option<LogFile> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .ok()?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Some(LogFile { file, written })
    }
}

/// Renders lifecycle events into the diagnostic log.
pub struct LogWriter {
    log: std::sync::Arc<DiagnosticLog>,
}

impl LogWriter {
    /// Creates a writer that appends to the given diagnostic log.
    pub fn new(log: std::sync::Arc<DiagnosticLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::StatusChanged { status, exit } => match exit {
                Some(exit) => self.log.info(
                    &e.service,
                    format!(
                        "status={status} code={:?} signal={:?}",
                        exit.code, exit.signal
                    ),
                ),
                None => self.log.info(&e.service, format!("status={status}")),
            },
            EventKind::Crashed { exit } => self.log.warn(
                &e.service,
                format!("crashed code={:?} signal={:?}", exit.code, exit.signal),
            ),
            EventKind::StartupProgress { elapsed, max_wait } => self.log.info(
                &e.service,
                format!(
                    "waiting for handshake {}ms/{}ms",
                    elapsed.as_millis(),
                    max_wait.as_millis()
                ),
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_formatted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidevisor.log");
        let log = DiagnosticLog::new(&path, 1024 * 1024);

        log.info("price-list", "started");
        log.warn("equipment", "slow handshake");

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let first = lines.next().unwrap();
        assert!(first.contains(" - INFO - [price-list] started"));
        let second = lines.next().unwrap();
        assert!(second.contains(" - WARNING - [equipment] slow handshake"));
    }

    #[test]
    fn rotates_wholesale_to_old_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidevisor.log");
        let log = DiagnosticLog::new(&path, 64);

        for i in 0..16 {
            log.info("svc", format!("line {i}"));
        }

        let old = log.old_path();
        assert!(old.exists(), "rotation should have produced a .old sibling");
        // Wholesale replacement: no second generation ever appears.
        assert!(!dir.path().join("sidevisor.log.old.old").exists());

        // The live file keeps accepting writes after rotation.
        log.info("svc", "after rotation");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("after rotation"));
    }

    #[test]
    fn write_failures_are_swallowed() {
        // Point at a directory that cannot be a file; every append is a no-op.
        let dir = tempfile::tempdir().unwrap();
        let log = DiagnosticLog::new(dir.path(), 1024);
        log.info("svc", "this has nowhere to go");
    }
}
