//! Per-directory HTML index pages.
//!
//! [`gen_index`] renders the listing of one directory from the
//! [`IndexTemplate`] in `templates/index.html`; [`generate_indexes`]
//! writes one such page into every content directory of a tree. Links to the
//! parent and to subdirectories point straight at the index file in them,
//! so the tree can be browsed without a server generating listings.

use anyhow::{Context, Result};
use askama::Template;
use std::path::{Path, PathBuf};

use crate::error::PublishError;
use crate::layout;
use crate::progress::{ProgressReporter, PublishEvent};
use crate::report::{Action, ActionReport, ItemOutcome};
use crate::walk::{walk_tree, DirListing, WalkMode};

/// Link to a subdirectory's own index page.
#[derive(Debug, Clone)]
pub struct DirLink {
    pub name: String,
    pub href: String,
}

/// Template for the listing of one directory. Names are HTML-escaped on
/// rendering.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub name: String,
    pub up_href: String,
    pub dirs: Vec<DirLink>,
    pub files: Vec<String>,
}

impl IndexTemplate {
    /// Listing of directory `dname` whose index file is called `iname`.
    ///
    /// The metadata directory is left out of the subdirectory list, and the
    /// index file itself out of the file list.
    pub fn new<S: AsRef<str>>(
        iname: &str,
        dname: &str,
        dirnames: &[S],
        filenames: &[S],
    ) -> Self {
        let dirs = dirnames
            .iter()
            .map(AsRef::as_ref)
            .filter(|dn| !layout::is_data_dir_name(dn))
            .map(|dn| DirLink {
                name: dn.to_string(),
                href: format!("{}/{}", dn, iname),
            })
            .collect();
        let files = filenames
            .iter()
            .map(AsRef::as_ref)
            .filter(|fn_| *fn_ != iname)
            .map(str::to_string)
            .collect();

        Self {
            name: dname.to_string(),
            up_href: format!("../{}", iname),
            dirs,
            files,
        }
    }
}

/// Render the index page of directory `dname`.
pub fn gen_index<S: AsRef<str>>(
    iname: &str,
    dname: &str,
    dirnames: &[S],
    filenames: &[S],
) -> Result<String> {
    IndexTemplate::new(iname, dname, dirnames, filenames)
        .render()
        .with_context(|| format!("Failed to render index of {}", dname))
}

/// Create an index file called `idxname` in every content directory under `root`.
///
/// Fails with [`PublishError::IndexConflict`] if an index file already exists
/// and `force` is not set. All directories are checked before anything is
/// written, so a conflict leaves the tree untouched.
pub fn generate_indexes(
    root: &Path,
    idxname: &str,
    force: bool,
    progress: &dyn ProgressReporter,
) -> Result<ActionReport> {
    let listings: Vec<DirListing> =
        walk_tree(root, WalkMode::Content).collect::<Result<_, _>>()?;

    let targets: Vec<(PathBuf, &DirListing)> = listings
        .iter()
        .map(|listing| (listing.path.join(idxname), listing))
        .collect();

    if !force {
        if let Some((path, _)) = targets.iter().find(|(path, _)| path.exists()) {
            return Err(PublishError::IndexConflict { path: path.clone() }.into());
        }
    }

    let mut report = ActionReport::new(Action::Index);
    for (path, listing) in targets {
        let index = gen_index(
            idxname,
            &listing.display_name(),
            &listing.subdirs,
            &listing.files,
        )?;
        std::fs::write(&path, index)
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;
        progress.report(PublishEvent::IndexWritten { path: path.clone() });
        report.record(path.display().to_string(), ItemOutcome::Succeeded);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_dirs_and_files() {
        let page = gen_index(
            "index.html",
            "site",
            &["sub", ".ouinet"],
            &["a.html", "index.html", "<a>"],
        )
        .unwrap();

        assert!(page.starts_with("<!DOCTYPE html>\n"));
        assert!(page.contains("<h1>Index for <code>site</code>:</h1>"));
        assert_eq!(page.matches("class=\"up\"").count(), 1);
        assert!(page.contains("<a href=\"../index.html\">Go up</a>"));
        assert!(page.contains("<li class=\"dir\"><a href=\"sub/index.html\">sub/</a></li>\n"));
        assert_eq!(page.matches("class=\"dir\"").count(), 1);
        assert!(!page.contains(".ouinet"));
        assert!(page.contains("<li class=\"file\"><a href=\"a.html\">a.html</a></li>\n"));
        assert!(page.contains("<li class=\"file\"><a href=\"&lt;a&gt;\">&lt;a&gt;</a></li>"));
        assert_eq!(page.matches("class=\"file\"").count(), 2);
        assert!(page.trim_end().ends_with("</ul>\n</body>"));
    }

    #[test]
    fn escapes_names() {
        let page = gen_index::<&str>("index.html", "a&b", &[], &[]).unwrap();
        assert!(page.contains("<code>a&amp;b</code>"));

        let page = gen_index("index.html", "site", &["<d>"], &["Tom & \"Jerry\".txt"]).unwrap();
        assert!(page.contains("<a href=\"&lt;d&gt;/index.html\">&lt;d&gt;/</a>"));
        assert!(page.contains("Tom &amp; &quot;Jerry&quot;.txt"));
        assert!(!page.contains("\"Jerry\""));
    }

    #[test]
    fn empty_listing_has_only_up_link() {
        let template = IndexTemplate::new::<&str>("list.html", "site", &[], &["list.html"]);
        assert!(template.dirs.is_empty());
        assert!(template.files.is_empty());
        assert_eq!(template.up_href, "../list.html");

        let page = template.render().unwrap();
        assert!(page.contains("Go up</a></li>\n</ul>"));
    }

    fn sample_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();
        fs::write(tmp.path().join("b.html"), "b").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "c").unwrap();
        fs::create_dir_all(tmp.path().join(".ouinet")).unwrap();
        tmp
    }

    #[test]
    fn writes_index_per_content_dir() {
        let tmp = sample_tree();
        let report = generate_indexes(tmp.path(), "index.html", false, &NoProgress).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.succeeded, 2);

        let root_index = fs::read_to_string(tmp.path().join("index.html")).unwrap();
        assert!(root_index.contains("a.html"));
        assert!(root_index.contains("b.html"));
        assert!(root_index.contains("sub/index.html"));
        assert!(tmp.path().join("sub/index.html").exists());
        assert!(!tmp.path().join(".ouinet/index.html").exists());
    }

    #[test]
    fn second_run_conflicts_and_writes_nothing() {
        let tmp = sample_tree();
        generate_indexes(tmp.path(), "index.html", false, &NoProgress).unwrap();

        // Remove one index so a partial rewrite would be noticeable.
        fs::remove_file(tmp.path().join("sub/index.html")).unwrap();
        let err = generate_indexes(tmp.path(), "index.html", false, &NoProgress).unwrap_err();
        match err.downcast_ref::<PublishError>() {
            Some(PublishError::IndexConflict { path }) => {
                assert_eq!(path, &tmp.path().join("index.html"))
            }
            other => panic!("expected index conflict, got {:?}", other),
        }
        assert!(!tmp.path().join("sub/index.html").exists());
    }

    #[test]
    fn overwrite_replaces_content() {
        let tmp = sample_tree();
        fs::write(tmp.path().join("index.html"), "stale").unwrap();

        let report = generate_indexes(tmp.path(), "index.html", true, &NoProgress).unwrap();
        assert!(report.is_ok());
        let root_index = fs::read_to_string(tmp.path().join("index.html")).unwrap();
        assert!(root_index.starts_with("<!DOCTYPE html>"));
        // The index file never lists itself.
        assert!(!root_index.contains("href=\"index.html\""));

        generate_indexes(tmp.path(), "index.html", true, &NoProgress).unwrap();
    }
}
