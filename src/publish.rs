//! Running the selected actions over one content tree.
//!
//! Actions run in a fixed order (index, inject, seed) so that index files
//! get injected and seeded, and descriptors produced by injection get
//! seeded. A fatal error in one action is reported and does not stop the
//! following ones.

use anyhow::Result;
use std::path::Path;

use crate::agent::Agent;
use crate::config::PublishConfig;
use crate::index::generate_indexes;
use crate::inject::inject_uris;
use crate::progress::ProgressReporter;
use crate::report::{Action, ActionReport};
use crate::seed::seed_files;

/// Outcome of one action: its report, or the fatal error that aborted it.
pub type ActionResult = (Action, Result<ActionReport>);

/// Sort and deduplicate selected actions into execution order.
pub fn plan(actions: &[Action]) -> Vec<Action> {
    let mut plan = actions.to_vec();
    plan.sort();
    plan.dedup();
    plan
}

fn banner(action: Action) -> &'static str {
    match action {
        Action::Index => "Creating index files...",
        Action::Inject => "Requesting content via the Ouinet client...",
        Action::Seed => "Uploading files to the Ouinet client...",
    }
}

/// Run `actions` over `root`, printing a banner before and a summary after each.
pub async fn run_actions(
    root: &Path,
    config: &PublishConfig,
    actions: &[Action],
    agent: &dyn Agent,
    progress: &dyn ProgressReporter,
) -> Vec<ActionResult> {
    let mut results = Vec::new();
    for action in plan(actions) {
        eprintln!("{}", banner(action));
        let result = match action {
            Action::Index => {
                generate_indexes(root, &config.index.name, config.index.overwrite, progress)
            }
            Action::Inject => inject_uris(root, config, agent, progress).await,
            Action::Seed => seed_files(root, config, agent, progress).await,
        };
        match &result {
            Ok(report) => eprintln!("{}", report.summary()),
            Err(e) => eprintln!("Error: {} aborted: {:#}", action, e),
        }
        results.push((action, result));
    }
    results
}

/// Whether all actions completed and every item in them succeeded.
pub fn all_ok(results: &[ActionResult]) -> bool {
    results
        .iter()
        .all(|(_, result)| matches!(result, Ok(report) if report.is_ok()))
}
