use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::PersistenceError;
use crate::types::Interval;

/// Append-only JSON array of graded intervals on disk.
///
/// Every append re-reads and rewrites the whole file. Files stay small (one
/// interval per graded minute at most), and the file is a valid JSON
/// document after every write.
#[derive(Debug, Clone)]
pub struct IntervalLog {
    path: PathBuf,
}

impl IntervalLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncates the log to an empty array, creating parent directories.
    pub async fn init(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        self.write_all(&[]).await?;
        tracing::debug!(path = %self.path.display(), "interval log initialized");
        Ok(())
    }

    pub async fn append(&self, interval: &Interval) -> Result<(), PersistenceError> {
        self.append_all(std::slice::from_ref(interval)).await
    }

    pub async fn append_all(&self, intervals: &[Interval]) -> Result<(), PersistenceError> {
        if intervals.is_empty() {
            return Ok(());
        }
        let mut stored = self.read_all().await?;
        stored.extend_from_slice(intervals);
        self.write_all(&stored).await?;
        tracing::debug!(
            path = %self.path.display(),
            appended = intervals.len(),
            total = stored.len(),
            "interval log updated"
        );
        Ok(())
    }

    /// Reads every stored interval; a missing file reads as empty.
    pub async fn read_all(&self) -> Result<Vec<Interval>, PersistenceError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&raw).map_err(|e| self.json_error(e))
    }

    async fn write_all(&self, intervals: &[Interval]) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec_pretty(intervals).map_err(|e| self.json_error(e))?;
        fs::write(&self.path, payload)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn json_error(&self, source: serde_json::Error) -> PersistenceError {
        PersistenceError::Json {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Writes batches to an [`IntervalLog`], keeping whatever failed so it goes
/// out with the next batch, in emission order.
#[derive(Debug)]
pub struct BufferedIntervalWriter {
    log: IntervalLog,
    pending: Vec<Interval>,
}

impl BufferedIntervalWriter {
    pub fn new(log: IntervalLog) -> Self {
        Self {
            log,
            pending: Vec::new(),
        }
    }

    pub fn log(&self) -> &IntervalLog {
        &self.log
    }

    /// Intervals still waiting for a successful write.
    pub fn pending(&self) -> &[Interval] {
        &self.pending
    }

    pub async fn write(&mut self, batch: Vec<Interval>) -> Result<(), PersistenceError> {
        self.pending.extend(batch);
        self.flush().await
    }

    pub async fn flush(&mut self) -> Result<(), PersistenceError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.log.append_all(&self.pending).await?;
        self.pending.clear();
        Ok(())
    }
}
