//! Append-only run log, one file per invocation.
//!
//! The log is a product artifact: it is created before any provisioning
//! action so even early failures are captured, and its path embeds the run
//! start time so reruns never clobber an earlier record.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::debug;

/// Severity of a run log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Ok,
    Warn,
    Fail,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Ok => " OK ",
            Level::Warn => "WARN",
            Level::Fail => "FAIL",
        }
    }
}

/// Append-only log tied to one sequencer invocation.
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Create `<log_dir>/provision-<timestamp>.log` and its parent directory.
    pub fn create(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("create log directory {}", log_dir.display()))?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = log_dir.join(format!("provision-{stamp}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("create run log {}", path.display()))?;
        debug!(path = %path.display(), "run log created");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&mut self, msg: &str) -> Result<()> {
        self.append(Level::Info, msg)
    }

    pub fn ok(&mut self, msg: &str) -> Result<()> {
        self.append(Level::Ok, msg)
    }

    pub fn warn(&mut self, msg: &str) -> Result<()> {
        self.append(Level::Warn, msg)
    }

    pub fn fail(&mut self, msg: &str) -> Result<()> {
        self.append(Level::Fail, msg)
    }

    fn append(&mut self, level: Level, msg: &str) -> Result<()> {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(self.file, "{stamp} [{}] {msg}", level.tag())
            .with_context(|| format!("append to run log {}", self.path.display()))?;
        self.file
            .flush()
            .with_context(|| format!("flush run log {}", self.path.display()))?;
        Ok(())
    }
}
