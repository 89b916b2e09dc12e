//! Fatal conditions that abort a whole action.
//!
//! These travel inside [`anyhow::Error`] like any other failure; callers
//! that need to tell them apart use `err.downcast_ref::<PublishError>()`.
//! Per-item problems (one failed upload, one URI not injected) are not
//! errors at this level, see [`crate::report`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("refusing to overwrite existing index file: {}", path.display())]
    IndexConflict { path: PathBuf },

    #[error("invalid URI prefix: {0:?}")]
    InvalidUriPrefix(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
