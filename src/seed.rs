//! Seeding of a content tree through the local client.
//!
//! Every regular file under the root is uploaded to the client so that it
//! serves its data to other peers. Files inside metadata directories are
//! classified first: descriptors are uploaded as content, insertion data is
//! sent to the insert endpoint of its database, the rest is skipped.

use anyhow::Result;
use std::path::Path;

use crate::agent::Agent;
use crate::classify::{classify_data_file, Classification, UploadTarget};
use crate::config::PublishConfig;
use crate::progress::{ProgressReporter, PublishEvent};
use crate::report::{Action, ActionReport, ItemOutcome};
use crate::walk::{walk_tree, WalkMode};

async fn seed_file(
    agent: &dyn Agent,
    path: &Path,
    target: &UploadTarget,
    progress: &dyn ProgressReporter,
) -> ItemOutcome {
    let result = agent.upload(target, path).await;
    let db = target.db.clone();
    match result {
        Ok(receipt) => {
            let detail = receipt.detail(db.as_deref());
            progress.report(PublishEvent::Uploaded {
                path: path.to_path_buf(),
                db,
                result: Ok(detail),
            });
            ItemOutcome::Succeeded
        }
        Err(e) => {
            let error = format!("{:#}", e);
            progress.report(PublishEvent::Uploaded {
                path: path.to_path_buf(),
                db,
                result: Err(error.clone()),
            });
            ItemOutcome::failed(error)
        }
    }
}

/// Upload files under `root` to the client for it to seed them.
///
/// Files in metadata directories are handled according to their purpose
/// (see [`classify_data_file`]); unrecognized ones are skipped without
/// counting as failures. A failed upload, or a directory that cannot be
/// read, is recorded in the returned report and the walk goes on.
pub async fn seed_files(
    root: &Path,
    config: &PublishConfig,
    agent: &dyn Agent,
    progress: &dyn ProgressReporter,
) -> Result<ActionReport> {
    let mut report = ActionReport::new(Action::Seed);
    for listing in walk_tree(root, WalkMode::All) {
        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                report.record(
                    e.path.display().to_string(),
                    ItemOutcome::failed(e.source.to_string()),
                );
                continue;
            }
        };
        let in_data_dir = listing.is_data_dir();

        for name in &listing.files {
            let path = listing.path.join(name);
            let target = if in_data_dir {
                match classify_data_file(name, config) {
                    Classification::Upload(target) => target,
                    Classification::UnknownDatabase(db) => {
                        report.record(
                            path.display().to_string(),
                            ItemOutcome::skipped(format!("unknown database: {}", db)),
                        );
                        continue;
                    }
                    Classification::Unrelated => {
                        report.record(
                            path.display().to_string(),
                            ItemOutcome::skipped("unrelated metadata file"),
                        );
                        continue;
                    }
                }
            } else {
                UploadTarget::generic(config)
            };

            let outcome = seed_file(agent, &path, &target, progress).await;
            report.record(path.display().to_string(), outcome);
        }
    }

    Ok(report)
}
