//! Top-down directory walk over a content tree.
//!
//! Yields one [`DirListing`] per directory, holding the names of its
//! subdirectories and files, the way the index, inject and seed actions all
//! want to see the tree. Whether metadata directories are descended into is
//! a single predicate ([`WalkMode`]) applied before each recursive step.
//!
//! A directory that cannot be read is yielded as a [`WalkError`] and the walk
//! goes on with the next one.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::layout;

/// Which directories the walk descends into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WalkMode {
    /// Content directories only; metadata directories are pruned.
    Content,
    /// Everything, metadata directories included.
    All,
}

/// One visited directory.
#[derive(Debug, Clone)]
pub struct DirListing {
    /// Path of the directory (root joined with `relative`).
    pub path: PathBuf,
    /// Path relative to the walk root (empty for the root itself).
    pub relative: PathBuf,
    /// Names of subdirectories, sorted.
    pub subdirs: Vec<String>,
    /// Names of non-directory entries, sorted.
    pub files: Vec<String>,
}

impl DirListing {
    /// Display name of the directory: its last path component.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Whether this directory is a metadata directory.
    pub fn is_data_dir(&self) -> bool {
        layout::is_data_dir(&self.path)
    }

    /// Relative path of this directory with `/` separators and no leading
    /// or trailing slash (empty for the root).
    pub fn relative_posix(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A directory that could not be read during a walk.
#[derive(Debug, thiserror::Error)]
#[error("Failed to list {}", .path.display())]
pub struct WalkError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

impl WalkError {
    fn new(fallback: &Path, source: walkdir::Error) -> Self {
        let path = source.path().unwrap_or(fallback).to_path_buf();
        Self { path, source }
    }
}

/// Walk `root` top-down. Directories are listed lazily, when reached, so
/// entries created in an already-visited directory are not seen.
pub fn walk_tree(
    root: &Path,
    mode: WalkMode,
) -> impl Iterator<Item = Result<DirListing, WalkError>> + '_ {
    let mut unlisted: Option<PathBuf> = None;
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| descend(e, mode))
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_dir() => {
                let listing = list_dir(root, e.path());
                if listing.is_err() {
                    unlisted = Some(e.path().to_path_buf());
                }
                Some(listing)
            }
            Ok(_) => None,
            // Already yielded when listing it.
            Err(err) if err.path().is_some() && err.path() == unlisted.as_deref() => None,
            Err(err) => Some(Err(WalkError::new(root, err))),
        })
}

fn descend(entry: &DirEntry, mode: WalkMode) -> bool {
    // The root is always visited, whatever its name.
    if entry.depth() == 0 {
        return true;
    }
    // Left out of listings, so not walked into either.
    if entry.file_name().to_str().is_none() {
        return false;
    }
    match mode {
        WalkMode::All => true,
        WalkMode::Content => !layout::is_data_dir(entry.path()),
    }
}

fn list_dir(root: &Path, dir: &Path) -> Result<DirListing, WalkError> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| WalkError::new(dir, e))?;
        let name = match entry.file_name().to_str() {
            Some(n) => n.to_string(),
            None => {
                eprintln!(
                    "Warning: skipping entry with non UTF-8 name: {}",
                    entry.path().display()
                );
                continue;
            }
        };
        // Symlinks to directories are listed as directories but not followed.
        if entry.file_type().is_dir() || (entry.path_is_symlink() && entry.path().is_dir()) {
            subdirs.push(name);
        } else {
            files.push(name);
        }
    }

    let relative = dir.strip_prefix(root).unwrap_or(dir).to_path_buf();
    Ok(DirListing {
        path: dir.to_path_buf(),
        relative,
        subdirs,
        files,
    })
}
