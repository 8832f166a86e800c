use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde_json::json;

/// Which long running operation is reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Parsing,
    Building,
    Importing,
    Exporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Parsing => write!(f, "parsing"),
            Phase::Building => write!(f, "building"),
            Phase::Importing => write!(f, "importing"),
            Phase::Exporting => write!(f, "exporting"),
        }
    }
}

/// Receives a notification after each unit of work. Never influences the operation itself.
pub trait ProgressObserver {
    fn on_progress(&mut self, phase: Phase, current: usize, total: usize);
}

/// Discards every notification.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _phase: Phase, _current: usize, _total: usize) {}
}

/// Logs each whole percentage step at debug level.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_percent: Option<usize>,
}

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, phase: Phase, current: usize, total: usize) {
        let percent = (current * 100).checked_div(total).unwrap_or(100);
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            log::debug!("{} {}% ({}/{})", phase, percent, current, total);
        }
    }
}

/// Mirrors progress into a small JSON file that another process can poll.
#[derive(Debug)]
pub struct JsonProgressFile {
    path: PathBuf,
}

impl JsonProgressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonProgressFile { path: path.into() }
    }
}

impl ProgressObserver for JsonProgressFile {
    fn on_progress(&mut self, phase: Phase, current: usize, total: usize) {
        let status = if current >= total { "done" } else { "running" };
        write_progress(&self.path, current, total, &phase.to_string(), status);
    }
}

pub fn write_progress(path: &Path, current: usize, total: usize, phase: &str, status: &str) {
    let json = json!({
        "current": current,
        "total": total,
        "phase": phase,
        "status": status,
    });
    if let Err(e) = fs::write(path, json.to_string()) {
        log::warn!("Failed to write progress file {}: {}", path.display(), e);
    }
}
