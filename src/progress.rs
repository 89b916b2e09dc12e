//! Per-item progress reporting.
//!
//! Reports what each action does to every item so users can follow a
//! publication run. Progress is emitted on **stderr**; stdout stays empty.
//!
//! The human format keeps the short markers of the publisher's log:
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `v` | injection requested for a URI |
//! | `>` | artifacts saved for an injected URI (`+DESC`, `-LINK`, ...) |
//! | `^` | file uploaded to the generic upload endpoint |
//! | `<` | insertion data uploaded to a database insert endpoint |
//! | `=` | index file written |

use std::io::Write;
use std::path::PathBuf;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum PublishEvent {
    IndexWritten {
        path: PathBuf,
    },
    /// Injection request answered; `error` is set if the URI was not injected.
    Injected {
        uri: String,
        error: Option<String>,
    },
    /// Artifacts persisted (or not) for an injected URI, by label.
    ArtifactsSaved {
        uri: String,
        saved: Vec<String>,
        failed: Vec<String>,
    },
    /// A file upload finished. `db` is set for insertion data uploads.
    Uploaded {
        path: PathBuf,
        db: Option<String>,
        result: Result<String, String>,
    },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: PublishEvent);
}

/// Human-friendly progress on stderr, one line per event.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: PublishEvent) {
        let line = human_line(&event);
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

fn human_line(event: &PublishEvent) -> String {
    match event {
        PublishEvent::IndexWritten { path } => format!("={}", path.display()),
        PublishEvent::Injected { uri, error: None } => format!("v{}", uri),
        PublishEvent::Injected {
            uri,
            error: Some(err),
        } => format!("v{} ERROR=\"{}\"", uri, err),
        PublishEvent::ArtifactsSaved { uri, saved, failed } => {
            let mut line = format!(">{}", uri);
            for label in saved {
                line.push_str(&format!(" +{}", label));
            }
            for label in failed {
                line.push_str(&format!(" -{}", label));
            }
            line
        }
        PublishEvent::Uploaded { path, db, result } => {
            let marker = if db.is_some() { '<' } else { '^' };
            let tail = match result {
                Ok(detail) => detail.clone(),
                Err(err) => format!("ERROR=\"{}\"", err),
            };
            format!("{}{} {}", marker, path.display(), tail)
        }
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: PublishEvent) {
        let obj = match &event {
            PublishEvent::IndexWritten { path } => serde_json::json!({
                "event": "index",
                "path": path.display().to_string(),
            }),
            PublishEvent::Injected { uri, error } => serde_json::json!({
                "event": "inject",
                "uri": uri,
                "ok": error.is_none(),
                "error": error,
            }),
            PublishEvent::ArtifactsSaved { uri, saved, failed } => serde_json::json!({
                "event": "artifacts",
                "uri": uri,
                "saved": saved,
                "failed": failed,
            }),
            PublishEvent::Uploaded { path, db, result } => serde_json::json!({
                "event": "seed",
                "path": path.display().to_string(),
                "db": db,
                "ok": result.is_ok(),
                "detail": result.as_ref().ok(),
                "error": result.as_ref().err(),
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: PublishEvent) {}
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
