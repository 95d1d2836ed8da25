use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::types::{LogRecord, LOG_COLUMNS};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("cannot create log file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("log flush failed: {0}")]
    Flush(#[from] std::io::Error),
}

/// CSV session log. Rows are only written while a file is open; the file is
/// flushed on `stop` and on drop.
///
/// Row times are seconds since `start`, so they keep increasing across
/// reconnects of the device.
#[derive(Default)]
pub struct SessionRecorder {
    writer: Option<csv::Writer<File>>,
    path: Option<PathBuf>,
    started: Option<Instant>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, path: &Path) -> Result<(), RecorderError> {
        if self.is_recording() {
            self.stop()?;
        }
        let file = File::create(path).map_err(|source| RecorderError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut w = csv::Writer::from_writer(file);
        w.write_record(LOG_COLUMNS)?;
        self.writer = Some(w);
        self.path = Some(path.to_path_buf());
        self.started = Some(Instant::now());
        log::info!("logging started -> {}", path.display());
        Ok(())
    }

    /// Close the file, returning where it was written.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, RecorderError> {
        let path = self.path.take();
        self.started = None;
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
            if let Some(p) = &path {
                log::info!("logging stopped, saved {}", p.display());
            }
        }
        Ok(path)
    }

    /// Seconds since logging started, 0 when idle.
    pub fn elapsed(&self) -> f64 {
        self.started
            .map_or(0.0, |started| started.elapsed().as_secs_f64())
    }

    /// No-op when not recording.
    pub fn write_record(&mut self, record: &LogRecord) -> Result<(), RecorderError> {
        if let Some(w) = &mut self.writer {
            w.write_record(record.csv_fields())?;
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if let Some(w) = &mut self.writer {
            if let Err(e) = w.flush() {
                log::warn!("flushing log on shutdown failed: {e}");
            }
        }
    }
}
