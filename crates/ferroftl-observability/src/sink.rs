//! Best-effort plain-text metrics sink.
//!
//! One line is appended per flush with space-separated fields:
//!
//! ```text
//! <tick> <gc_invocations> <page_copies> <valid_copies> <erases> <avg_response_time> <p99> <p99.9> <p99.99>
//! ```
//!
//! The field count and ordering are the schema. Files are opened lazily on
//! the first flush; an open or write failure emits one warning and disables
//! the stream without affecting the policy.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ferroftl_types::Tick;

use crate::stats::GcStats;
use crate::window::LatencyWindow;

/// Response-time observations between metrics flushes.
pub const FLUSH_INTERVAL: u64 = 1000;

#[derive(Debug)]
enum Stream {
    Unopened,
    Open(File),
    Disabled,
}

/// File-backed metrics sink owning its handles for the run's lifetime.
#[derive(Debug)]
pub struct MetricsSink {
    enabled: bool,
    dir: PathBuf,
    prefix: String,
    metrics: Stream,
}

impl MetricsSink {
    /// Sink writing `<prefix>_metrics.txt` and `<prefix>_summary.txt` under
    /// `dir`. The directory is created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            enabled: true,
            dir: dir.into(),
            prefix: prefix.into(),
            metrics: Stream::Unopened,
        }
    }

    /// Sink that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::new(),
            prefix: String::new(),
            metrics: Stream::Disabled,
        }
    }

    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(format!("{}_metrics.txt", self.prefix))
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("{}_summary.txt", self.prefix))
    }

    fn open_metrics(dir: &Path, path: &Path) -> std::io::Result<File> {
        fs::create_dir_all(dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "# ferroftl GC metrics")?;
        writeln!(
            file,
            "# <tick> <gc_invocations> <page_copies> <valid_copies> <erases> \
             <avg_response_time> <p99> <p99.9> <p99.99>"
        )?;
        Ok(file)
    }

    /// Append one metrics line. Silently a no-op once the stream is disabled.
    pub fn flush_line(&mut self, tick: Tick, stats: &GcStats, window: &LatencyWindow) {
        if !self.enabled {
            return;
        }
        if matches!(self.metrics, Stream::Unopened) {
            let path = self.metrics_path();
            match Self::open_metrics(&self.dir, &path) {
                Ok(file) => self.metrics = Stream::Open(file),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "metrics stream disabled");
                    self.metrics = Stream::Disabled;
                }
            }
        }

        if let Stream::Open(file) = &mut self.metrics {
            let line = format!(
                "{} {} {} {} {} {:.2} {} {} {}",
                tick,
                stats.gc_invocations,
                stats.total_page_copies,
                stats.valid_page_copies,
                stats.erase_count,
                window.mean_ns(),
                window.percentile_ns(0.99),
                window.percentile_ns(0.999),
                window.percentile_ns(0.9999),
            );
            if let Err(error) = writeln!(file, "{line}") {
                tracing::warn!(%error, "metrics stream disabled after write failure");
                self.metrics = Stream::Disabled;
            }
        }
    }

    /// Overwrite the free-form summary report. Best-effort like the metrics
    /// stream; a failure warns and is otherwise ignored.
    pub fn write_summary(&self, body: &str) {
        if !self.enabled {
            return;
        }
        let path = self.summary_path();
        let result = fs::create_dir_all(&self.dir).and_then(|()| fs::write(&path, body));
        if let Err(error) = result {
            tracing::warn!(path = %path.display(), %error, "failed to write summary report");
        }
    }
}
