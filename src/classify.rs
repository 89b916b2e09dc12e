//! Classification of files found in a metadata directory for seeding.
//!
//! Descriptors are uploaded like any other content, insertion data goes to
//! the insert endpoint of its database, and anything else is left alone.

use crate::config::{PublishConfig, GENERIC_CONTENT_TYPE};
use crate::layout;

/// Where and how a file is uploaded to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub endpoint: String,
    pub content_type: String,
    /// Set for insertion data: the agent answers with a `key`, not `data_links`.
    pub db: Option<String>,
}

impl UploadTarget {
    /// Generic content upload.
    pub fn generic(config: &PublishConfig) -> Self {
        Self {
            endpoint: config.api.upload_endpoint.clone(),
            content_type: GENERIC_CONTENT_TYPE.to_string(),
            db: None,
        }
    }
}

/// Result of classifying a metadata directory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Upload(UploadTarget),
    /// Insertion data for a database without a registered content type.
    UnknownDatabase(String),
    /// Not an artifact that gets seeded.
    Unrelated,
}

/// Database id of an insertion data file name (`<name>.ins-<db>`), if any.
pub fn insertion_db(file_name: &str) -> Option<&str> {
    let (_, db) = file_name.rsplit_once(layout::INS_FILE_EXT_PREFIX)?;
    layout::is_valid_db_id(db).then_some(db)
}

/// Classify `file_name`, found directly inside a metadata directory.
pub fn classify_data_file(file_name: &str, config: &PublishConfig) -> Classification {
    if let Some(db) = insertion_db(file_name) {
        return match config.seed.content_type_for(db) {
            Some(ctype) => Classification::Upload(UploadTarget {
                endpoint: config.api.insert_endpoint(db),
                content_type: ctype.to_string(),
                db: Some(db.to_string()),
            }),
            None => Classification::UnknownDatabase(db.to_string()),
        };
    }
    if file_name.ends_with(layout::DESC_FILE_EXT) {
        return Classification::Upload(UploadTarget::generic(config));
    }
    Classification::Unrelated
}
