//! Progress reporting capability injected into pipeline components.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

pub trait ProgressReporter: Send + Sync {
    /// A unit of work identified by `label` started. `total` is in bytes when known.
    fn start(&self, label: &str, total: Option<u64>);

    fn advance(&self, label: &str, current: u64);

    fn finish(&self, label: &str);
}

pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    fn start(&self, _label: &str, _total: Option<u64>) {}
    fn advance(&self, _label: &str, _current: u64) {}
    fn finish(&self, _label: &str) {}
}

/// Logs start and completion at debug level, skips intermediate ticks.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn start(&self, label: &str, total: Option<u64>) {
        debug!(label, total, "transfer started");
    }

    fn advance(&self, _label: &str, _current: u64) {}

    fn finish(&self, label: &str) {
        debug!(label, "transfer finished");
    }
}

/// One terminal progress bar per in-flight transfer.
pub struct ConsoleProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    style: ProgressStyle,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{msg:30!} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn start(&self, label: &str, total: Option<u64>) {
        let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
        bar.set_style(self.style.clone());
        bar.set_message(label.to_string());
        self.bars.lock().unwrap().insert(label.to_string(), bar);
    }

    fn advance(&self, label: &str, current: u64) {
        if let Some(bar) = self.bars.lock().unwrap().get(label) {
            bar.set_position(current);
        }
    }

    fn finish(&self, label: &str) {
        if let Some(bar) = self.bars.lock().unwrap().remove(label) {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_progress_tracks_bars_by_label() {
        let progress = ConsoleProgress::new();
        progress.start("a.mp4", Some(100));
        progress.start("b.jpg", None);
        progress.advance("a.mp4", 50);
        assert_eq!(progress.bars.lock().unwrap().len(), 2);

        progress.finish("a.mp4");
        progress.finish("missing");
        let bars = progress.bars.lock().unwrap();
        assert_eq!(bars.len(), 1);
        assert!(bars.contains_key("b.jpg"));
    }
}
