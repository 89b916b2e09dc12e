//! Per-item outcomes folded into a per-action report.
//!
//! Actions never stop at the first failing item. Each item contributes an
//! [`ItemOutcome`] to an [`ActionReport`], and the action as a whole is
//! successful only if every item was.

use std::fmt;

/// One of the publishing actions selectable on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, clap::ValueEnum)]
pub enum Action {
    /// Create per-directory index files.
    Index,
    /// Request content via the client to inject it and store descriptors beside it.
    Inject,
    /// Upload files to the client so it seeds their data.
    Seed,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::Inject => "inject",
            Action::Seed => "seed",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one item (file, directory or URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Failed { reason: String },
    /// Deliberately not processed; does not affect the action's success.
    Skipped { reason: String },
}

impl ItemOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ItemOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        ItemOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

/// A failed item and why it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

/// Aggregate of all item outcomes of one action run.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action: Action,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub failures: Vec<ItemFailure>,
}

impl ActionReport {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, item: impl Into<String>, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push(ItemFailure {
                    item: item.into(),
                    reason,
                });
            }
        }
    }

    /// Whether every processed item succeeded.
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }

    /// Number of items that were actually processed.
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Multi-line summary for the end of a run.
    pub fn summary(&self) -> String {
        let mut out = format!("{}\n", self.action);
        out.push_str(&format!("  succeeded: {}\n", self.succeeded));
        out.push_str(&format!("  failed: {}\n", self.failed));
        if self.skipped > 0 {
            out.push_str(&format!("  skipped: {}\n", self.skipped));
        }
        for failure in &self.failures {
            out.push_str(&format!("    {}: {}\n", failure.item, failure.reason));
        }
        out.push_str(if self.is_ok() { "ok" } else { "FAILED" });
        out
    }
}
