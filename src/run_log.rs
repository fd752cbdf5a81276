//! Per-run anomaly log.
//!
//! Entries accumulate in memory while the run is live and are written once,
//! as a single JSON file, when the run ends. Nothing is written for a clean run.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub struct AnomalyLog {
    dir: PathBuf,
    entries: Mutex<Vec<Value>>,
}

impl AnomalyLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, kind: &str, details: Value) {
        let entry = json!({
            "kind": kind,
            "recorded_at": Utc::now().to_rfc3339(),
            "details": details,
        });
        self.entries.lock().unwrap().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().unwrap().clone()
    }

    /// Writes `data_{YYYYmmdd_HHMM}_{xxxx}.json` if anything was recorded.
    /// The in-memory buffer is emptied either way.
    pub fn flush(&self) -> Result<Option<PathBuf>> {
        let entries = std::mem::take(&mut *self.entries.lock().unwrap());
        if entries.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create anomaly log dir {:?}", self.dir))?;
        let suffix = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "data_{}_{}.json",
            Utc::now().format("%Y%m%d_%H%M"),
            &suffix[..4]
        );
        let path = self.dir.join(file_name);
        let content = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write anomaly log {:?}", path))?;

        info!("Wrote {} anomalies to {:?}", entries.len(), path);
        Ok(Some(path))
    }
}
