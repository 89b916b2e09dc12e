//! Reserved names in a published content tree.
//!
//! Every content directory may hold one metadata directory (`.ouinet`) with
//! the artifacts produced by injection. Artifact names are derived from the
//! owning file name plus a fixed suffix, so re-injecting a file overwrites
//! its previous artifacts in place:
//!
//! | Artifact | File name |
//! |----------|-----------|
//! | Descriptor | `<name>.desc` |
//! | Descriptor link | `<name>.link` |
//! | Insertion data | `<name>.ins-<db-id>` |
//!
//! The directory itself is injected too, and its artifacts use an empty
//! base name (`.desc`, `.link`, ...).

use std::path::{Path, PathBuf};

/// Name of the per-directory metadata directory.
pub const DATA_DIR_NAME: &str = ".ouinet";

/// Extension of descriptor files.
pub const DESC_FILE_EXT: &str = ".desc";

/// Extension of descriptor storage link files.
pub const LINK_FILE_EXT: &str = ".link";

/// Prefix of the extension of insertion data files, followed by the db id.
pub const INS_FILE_EXT_PREFIX: &str = ".ins-";

/// Whether `name` is the reserved metadata directory name.
pub fn is_data_dir_name(name: &str) -> bool {
    name == DATA_DIR_NAME
}

/// Whether `path` points at a metadata directory (by its last component).
pub fn is_data_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(is_data_dir_name)
        .unwrap_or(false)
}

/// Metadata directory of a content directory.
pub fn data_dir_of(dir: &Path) -> PathBuf {
    dir.join(DATA_DIR_NAME)
}

/// Whether a database id is well formed: one or more `[0-9a-z]`.
pub fn is_valid_db_id(db: &str) -> bool {
    !db.is_empty()
        && db
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Kind of artifact kept in a metadata directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Descriptor,
    DescriptorLink,
    /// Insertion data for the given (lowercase) database id.
    InsertionData(String),
}

impl ArtifactKind {
    /// File name extension for this artifact kind.
    pub fn extension(&self) -> String {
        match self {
            ArtifactKind::Descriptor => DESC_FILE_EXT.to_string(),
            ArtifactKind::DescriptorLink => LINK_FILE_EXT.to_string(),
            ArtifactKind::InsertionData(db) => format!("{}{}", INS_FILE_EXT_PREFIX, db),
        }
    }

    /// Artifact file name for the content item called `owner`
    /// (empty for the directory itself).
    pub fn file_name(&self, owner: &str) -> String {
        format!("{}{}", owner, self.extension())
    }

    /// Short uppercase label used in progress output (`DESC`, `LINK`, `BEP44`).
    pub fn label(&self) -> String {
        match self {
            ArtifactKind::Descriptor => "DESC".to_string(),
            ArtifactKind::DescriptorLink => "LINK".to_string(),
            ArtifactKind::InsertionData(db) => db.to_uppercase(),
        }
    }
}
