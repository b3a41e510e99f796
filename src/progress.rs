//! Ingest progress reporting.
//!
//! Reports observable progress during `docrag ingest` so users see which
//! file is being processed, how many are left, and what was stored or
//! skipped. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event for ingestion.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Input paths are being expanded into files. Total unknown.
    Discovering,
    /// File `n` of `total` is being extracted, chunked and embedded.
    Processing { file: String, n: u64, total: u64 },
    /// A file's chunks were stored.
    Stored {
        file: String,
        chunks: u64,
        degraded: u64,
        reset: bool,
    },
    /// A file was skipped (unsupported type, empty, or extraction failure).
    Skipped { file: String, reason: String },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingest pipeline.
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  processing  3 / 1,200  notes.md".
pub struct StderrProgress;

fn human_line(event: &IngestProgressEvent) -> String {
    match event {
        IngestProgressEvent::Discovering => "ingest  discovering...\n".to_string(),
        IngestProgressEvent::Processing { file, n, total } => format!(
            "ingest  processing  {} / {}  {}\n",
            format_number(*n),
            format_number(*total),
            file
        ),
        IngestProgressEvent::Stored {
            file,
            chunks,
            degraded,
            reset,
        } => {
            let mut line = format!("ingest  stored  {} chunks  {}", format_number(*chunks), file);
            if *degraded > 0 {
                line.push_str(&format!("  ({} degraded)", degraded));
            }
            if *reset {
                line.push_str("  (collection reset: embedding dimension changed)");
            }
            line.push('\n');
            line
        }
        IngestProgressEvent::Skipped { file, reason } => {
            format!("ingest  skipped  {}  {}\n", file, reason)
        }
    }
}

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = human_line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

fn json_event(event: &IngestProgressEvent) -> serde_json::Value {
    match event {
        IngestProgressEvent::Discovering => serde_json::json!({
            "event": "progress",
            "phase": "discovering"
        }),
        IngestProgressEvent::Processing { file, n, total } => serde_json::json!({
            "event": "progress",
            "phase": "processing",
            "file": file,
            "n": n,
            "total": total
        }),
        IngestProgressEvent::Stored {
            file,
            chunks,
            degraded,
            reset,
        } => serde_json::json!({
            "event": "stored",
            "file": file,
            "chunks": chunks,
            "degraded": degraded,
            "reset": reset
        }),
        IngestProgressEvent::Skipped { file, reason } => serde_json::json!({
            "event": "skipped",
            "file": file,
            "reason": reason
        }),
    }
}

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Ok(line) = serde_json::to_string(&json_event(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn human_line_mentions_reset_and_degraded() {
        let line = human_line(&IngestProgressEvent::Stored {
            file: "a.txt".into(),
            chunks: 4,
            degraded: 1,
            reset: true,
        });
        assert!(line.contains("4 chunks"));
        assert!(line.contains("1 degraded"));
        assert!(line.contains("collection reset"));
    }

    #[test]
    fn json_event_shape() {
        let v = json_event(&IngestProgressEvent::Processing {
            file: "b.md".into(),
            n: 2,
            total: 5,
        });
        assert_eq!(v["phase"], "processing");
        assert_eq!(v["n"], 2);
        assert_eq!(v["total"], 5);
    }
}
