//! Injection of a content tree through the local client.
//!
//! Every content directory and file is requested through the client's proxy
//! with synchronous injection enabled, under a URI made of a fixed prefix
//! and the item's path relative to the tree root. The client answers once
//! the content is stored, carrying in response headers:
//!
//! | Header | Content | Saved as |
//! |--------|---------|----------|
//! | `X-Ouinet-Descriptor` | base64 of a zlib-compressed descriptor | `.ouinet/<name>.desc` (decompressed) |
//! | `X-Ouinet-Descriptor-Link` | opaque storage link | `.ouinet/<name>.link` |
//! | `X-Ouinet-Insert-<Db>` | base64 insertion data for index `<db>` | `.ouinet/<name>.ins-<db>` (decoded) |
//!
//! A response without a descriptor means the URI was not injected. Each
//! artifact is saved independently: one that fails to decode or write is
//! reported without preventing the others from being saved.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::ZlibDecoder;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::agent::{Agent, InjectionResponse};
use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::layout::{self, ArtifactKind};
use crate::progress::{ProgressReporter, PublishEvent};
use crate::report::{Action, ActionReport, ItemOutcome};
use crate::walk::{walk_tree, WalkMode};

/// Field of an [`InjectionResult`] filled from a response header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InjectionField {
    Descriptor,
    DescriptorLink,
    /// The rest of the header name is the db id.
    InsertionData,
}

/// How a response header name is matched (always case-insensitively).
#[derive(Clone, Copy, Debug)]
enum HeaderMatch {
    Exact(&'static str),
    Prefix(&'static str),
}

/// Response headers carrying injection results, lowercase.
const INJECTION_HEADERS: &[(HeaderMatch, InjectionField)] = &[
    (HeaderMatch::Exact("x-ouinet-descriptor"), InjectionField::Descriptor),
    (HeaderMatch::Exact("x-ouinet-descriptor-link"), InjectionField::DescriptorLink),
    (HeaderMatch::Prefix("x-ouinet-insert-"), InjectionField::InsertionData),
];

/// Match a header name against the table, returning the field and the
/// remainder of the name for prefix rules.
fn match_header(name: &str) -> Option<(InjectionField, String)> {
    let name = name.to_ascii_lowercase();
    INJECTION_HEADERS.iter().find_map(|(rule, field)| match rule {
        HeaderMatch::Exact(h) => (name == *h).then(|| (*field, String::new())),
        HeaderMatch::Prefix(p) => name.strip_prefix(p).map(|rest| (*field, rest.to_string())),
    })
}

/// Raw injection data recovered from one response, still encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionResult {
    pub descriptor: Option<Vec<u8>>,
    pub link: Option<Vec<u8>>,
    /// Insertion data by lowercase db id.
    pub insertion_data: BTreeMap<String, Vec<u8>>,
}

impl InjectionResult {
    pub fn from_response(response: &InjectionResponse) -> Self {
        let mut result = InjectionResult::default();
        for (name, value) in &response.headers {
            match match_header(name) {
                Some((InjectionField::Descriptor, _)) => result.descriptor = Some(value.clone()),
                Some((InjectionField::DescriptorLink, _)) => result.link = Some(value.clone()),
                Some((InjectionField::InsertionData, db)) if !db.is_empty() => {
                    result.insertion_data.insert(db, value.clone());
                }
                _ => {}
            }
        }
        result
    }

    /// Artifacts to save for this result, with their still-encoded data.
    fn artifacts(&self) -> Vec<(ArtifactKind, Option<&[u8]>)> {
        let mut artifacts = vec![
            (ArtifactKind::Descriptor, self.descriptor.as_deref()),
            (ArtifactKind::DescriptorLink, self.link.as_deref()),
        ];
        for (db, data) in &self.insertion_data {
            artifacts.push((ArtifactKind::InsertionData(db.clone()), Some(data.as_slice())));
        }
        artifacts
    }
}

/// Check that `prefix` starts with an absolute URI scheme (`[a-z][a-z0-9+.-]+:`).
pub fn validate_uri_prefix(prefix: &str) -> Result<()> {
    let valid = prefix.split_once(':').is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && scheme.len() >= 2
            && chars.all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.')
            })
    });
    if valid {
        Ok(())
    } else {
        Err(PublishError::InvalidUriPrefix(prefix.to_string()).into())
    }
}

/// URI of an item: `prefix` (without trailing slashes), `/`, then the item's
/// POSIX relative path. `name` is empty for the directory itself, whose URI
/// ends in `/`.
pub fn item_uri(prefix: &str, dir_relative: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if dir_relative.is_empty() {
        format!("{}/{}", prefix, name)
    } else {
        format!("{}/{}/{}", prefix, dir_relative, name)
    }
}

/// Decode the raw header data of an artifact into the bytes to be saved.
fn decode_artifact(kind: &ArtifactKind, raw: Option<&[u8]>) -> Result<Vec<u8>> {
    let raw = raw.ok_or_else(|| anyhow!("missing from response"))?;
    match kind {
        ArtifactKind::Descriptor => {
            let compressed = STANDARD.decode(raw).context("invalid base64")?;
            let mut data = Vec::new();
            ZlibDecoder::new(compressed.as_slice())
                .read_to_end(&mut data)
                .context("invalid zlib data")?;
            Ok(data)
        }
        ArtifactKind::DescriptorLink => Ok(raw.to_vec()),
        ArtifactKind::InsertionData(_) => Ok(STANDARD.decode(raw).context("invalid base64")?),
    }
}

/// Atomically replace `path` with `data`: readers never see a partial file.
///
/// The file gets the mode of any newly created file (`0666` less the umask)
/// rather than the owner-only mode of temporary files.
fn write_atomic(data_dir: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder
        .tempfile_in(data_dir)
        .with_context(|| format!("Failed to create temporary file in {}", data_dir.display()))?;
    tmp.write_all(data)?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Decode and save every artifact of `result` for item `name`.
/// Returns the labels of saved and of failed artifacts.
fn save_artifacts(result: &InjectionResult, data_dir: &Path, name: &str) -> (Vec<String>, Vec<String>) {
    let mut saved = Vec::new();
    let mut failed = Vec::new();
    for (kind, raw) in result.artifacts() {
        let path = data_dir.join(kind.file_name(name));
        let outcome = decode_artifact(&kind, raw).and_then(|data| write_atomic(data_dir, &path, &data));
        match outcome {
            Ok(()) => saved.push(kind.label()),
            Err(e) => {
                eprintln!("Warning: {}: {:#}", path.display(), e);
                failed.push(kind.label());
            }
        }
    }
    (saved, failed)
}

fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    match std::fs::create_dir(data_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display())),
    }
}

async fn inject_item(
    agent: &dyn Agent,
    uri: &str,
    data_dir: &Path,
    name: &str,
    progress: &dyn ProgressReporter,
) -> ItemOutcome {
    let error = match agent.inject(uri).await {
        Ok(response) => {
            let result = InjectionResult::from_response(&response);
            if result.descriptor.is_some() {
                progress.report(PublishEvent::Injected {
                    uri: uri.to_string(),
                    error: None,
                });
                let (saved, failed) = save_artifacts(&result, data_dir, name);
                let outcome = if failed.is_empty() {
                    ItemOutcome::Succeeded
                } else {
                    ItemOutcome::failed(format!("failed to save {}", failed.join(", ")))
                };
                progress.report(PublishEvent::ArtifactsSaved {
                    uri: uri.to_string(),
                    saved,
                    failed,
                });
                return outcome;
            }
            "URI was not injected".to_string()
        }
        Err(e) => format!("{:#}", e),
    };

    progress.report(PublishEvent::Injected {
        uri: uri.to_string(),
        error: Some(error.clone()),
    });
    ItemOutcome::failed(error)
}

/// Request content under `root` via the client to inject it.
///
/// URIs are built by prepending the configured URI prefix to each item's
/// path relative to `root`; each directory is requested too, before its
/// files. Descriptors, links and insertion data resulting from injecting an
/// item are saved in the metadata directory beside it. Metadata directories
/// themselves are never injected.
///
/// An invalid URI prefix is an error. Items that fail to be injected, or
/// whose artifacts fail to be saved, and directories that cannot be read
/// are recorded in the returned report.
pub async fn inject_uris(
    root: &Path,
    config: &PublishConfig,
    agent: &dyn Agent,
    progress: &dyn ProgressReporter,
) -> Result<ActionReport> {
    validate_uri_prefix(&config.inject.uri_prefix)?;

    let mut report = ActionReport::new(Action::Inject);
    for listing in walk_tree(root, WalkMode::Content) {
        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                // Unreadable directory: its items cannot be reached, others can.
                report.record(
                    e.path.display().to_string(),
                    ItemOutcome::failed(e.source.to_string()),
                );
                continue;
            }
        };
        let data_dir = layout::data_dir_of(&listing.path);
        ensure_data_dir(&data_dir)?;

        let dir_relative = listing.relative_posix();
        let names = std::iter::once("").chain(listing.files.iter().map(String::as_str));
        for name in names {
            let uri = item_uri(&config.inject.uri_prefix, &dir_relative, name);
            let outcome = inject_item(agent, &uri, &data_dir, name, progress).await;
            report.record(uri, outcome);
        }
    }

    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::UploadReceipt;
    use crate::classify::UploadTarget;
    use crate::progress::NoProgress;
    use anyhow::bail;
    use async_trait::async_trait;
    use flate2::{write::ZlibEncoder, Compression};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub(crate) fn encode_descriptor(data: &[u8]) -> String {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        STANDARD.encode(enc.finish().unwrap())
    }

    /// Agent injecting every URI except those in `reject`.
    #[derive(Default)]
    struct FakeAgent {
        reject: Vec<String>,
        overrides: HashMap<String, InjectionResponse>,
        requests: Mutex<Vec<String>>,
        /// Directory removed while injecting the given URI.
        remove_on_inject: Option<(String, PathBuf)>,
    }

    #[async_trait]
    impl Agent for FakeAgent {
        async fn inject(&self, uri: &str) -> Result<InjectionResponse> {
            self.requests.lock().unwrap().push(uri.to_string());
            if let Some((target, dir)) = &self.remove_on_inject {
                if target == uri {
                    fs::remove_dir_all(dir).unwrap();
                }
            }
            if self.reject.iter().any(|u| u == uri) {
                bail!("HTTP 502 Bad Gateway");
            }
            if let Some(res) = self.overrides.get(uri) {
                return Ok(res.clone());
            }
            Ok(InjectionResponse::default()
                .with_header("X-Ouinet-Descriptor", encode_descriptor(uri.as_bytes()))
                .with_header("X-Ouinet-Descriptor-Link", format!("/ipfs/{}", uri.len()))
                .with_header("X-Ouinet-Insert-BEP44", STANDARD.encode(b"ins")))
        }

        async fn upload(&self, _target: &UploadTarget, _path: &Path) -> Result<UploadReceipt> {
            bail!("not an uploader")
        }
    }

    fn config(prefix: &str) -> PublishConfig {
        let mut cfg = PublishConfig::default();
        cfg.inject.uri_prefix = prefix.to_string();
        cfg
    }

    #[test]
    fn uri_prefix_validation() {
        validate_uri_prefix("http://pub.example/").unwrap();
        validate_uri_prefix("https:").unwrap();
        validate_uri_prefix("git+ssh://host/").unwrap();

        for bad in ["", "pub.example/", "Http://x", "h:", "1ttp://x", "ht tp://x"] {
            let err = validate_uri_prefix(bad).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<PublishError>(),
                    Some(PublishError::InvalidUriPrefix(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn item_uris() {
        assert_eq!(item_uri("http://pub.example/", "", ""), "http://pub.example/");
        assert_eq!(item_uri("http://pub.example//", "", "a.html"), "http://pub.example/a.html");
        assert_eq!(item_uri("http://pub.example", "sub", ""), "http://pub.example/sub/");
        assert_eq!(
            item_uri("http://pub.example/base", "sub/deeper", "c.txt"),
            "http://pub.example/base/sub/deeper/c.txt"
        );
    }

    #[test]
    fn header_table_matching() {
        let response = InjectionResponse {
            headers: vec![
                ("X-OUINET-DESCRIPTOR".into(), b"d".to_vec()),
                ("x-ouinet-descriptor-link".into(), b"l".to_vec()),
                ("x-ouinet-insert-Bep44".into(), b"i".to_vec()),
                ("x-ouinet-insert-".into(), b"empty".to_vec()),
                ("content-type".into(), b"text/html".to_vec()),
            ],
        };
        let result = InjectionResult::from_response(&response);
        assert_eq!(result.descriptor.as_deref(), Some(&b"d"[..]));
        assert_eq!(result.link.as_deref(), Some(&b"l"[..]));
        assert_eq!(result.insertion_data.len(), 1);
        assert_eq!(result.insertion_data.get("bep44").map(Vec::as_slice), Some(&b"i"[..]));
    }

    #[tokio::test]
    async fn decodes_descriptor() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();

        let uri = "http://pub.example/a.html".to_string();
        let mut agent = FakeAgent::default();
        agent.overrides.insert(
            uri.clone(),
            InjectionResponse::default()
                .with_header("X-Ouinet-Descriptor", encode_descriptor(b"hello"))
                .with_header("X-Ouinet-Descriptor-Link", "/ipfs/QmLink"),
        );

        let report = inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(report.is_ok(), "{}", report.summary());

        let data_dir = tmp.path().join(".ouinet");
        assert_eq!(fs::read(data_dir.join("a.html.desc")).unwrap(), b"hello");
        assert_eq!(fs::read(data_dir.join("a.html.link")).unwrap(), b"/ipfs/QmLink");
        assert!(!data_dir.join("a.html.ins-bep44").exists());
    }

    #[tokio::test]
    async fn walks_tree_and_saves_artifacts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();
        fs::write(tmp.path().join("b.html"), "b").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "c").unwrap();

        let agent = FakeAgent::default();
        let report = inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(report.is_ok());
        assert_eq!(report.succeeded, 5);

        assert_eq!(
            *agent.requests.lock().unwrap(),
            vec![
                "http://pub.example/",
                "http://pub.example/a.html",
                "http://pub.example/b.html",
                "http://pub.example/sub/",
                "http://pub.example/sub/c.txt",
            ]
        );

        let root_data = tmp.path().join(".ouinet");
        assert_eq!(fs::read(root_data.join(".desc")).unwrap(), b"http://pub.example/");
        assert!(root_data.join(".link").exists());
        assert_eq!(fs::read(root_data.join("a.html.ins-bep44")).unwrap(), b"ins");
        assert_eq!(
            fs::read(tmp.path().join("sub/.ouinet/c.txt.desc")).unwrap(),
            b"http://pub.example/sub/c.txt"
        );

        // Re-injection overwrites artifacts and never injects the data dir.
        agent.requests.lock().unwrap().clear();
        let report = inject_uris(tmp.path(), &config("http://pub.example"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(report.is_ok());
        assert!(agent
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|u| !u.contains(".ouinet")));
    }

    #[tokio::test]
    async fn missing_descriptor_fails_item_only() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();
        fs::write(tmp.path().join("b.html"), "b").unwrap();

        let mut agent = FakeAgent::default();
        agent.overrides.insert(
            "http://pub.example/a.html".into(),
            InjectionResponse::default().with_header("X-Ouinet-Descriptor-Link", "/ipfs/x"),
        );
        agent.reject.push("http://pub.example/".into());

        let report = inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 1);
        assert!(report
            .failures
            .iter()
            .any(|f| f.item == "http://pub.example/a.html" && f.reason == "URI was not injected"));

        let data_dir = tmp.path().join(".ouinet");
        assert!(!data_dir.join("a.html.desc").exists());
        assert!(!data_dir.join("a.html.link").exists());
        assert!(data_dir.join("b.html.desc").exists());
    }

    #[tokio::test]
    async fn artifact_failures_are_independent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();

        let mut agent = FakeAgent::default();
        agent.overrides.insert(
            "http://pub.example/a.html".into(),
            InjectionResponse::default()
                .with_header("X-Ouinet-Descriptor", encode_descriptor(b"desc"))
                .with_header("X-Ouinet-Insert-Bep44", "not base64!")
                .with_header("X-Ouinet-Insert-Other", STANDARD.encode(b"other")),
        );

        let report = inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.failed, 1);
        let failure = &report.failures[0];
        assert_eq!(failure.item, "http://pub.example/a.html");
        assert!(failure.reason.contains("LINK"));
        assert!(failure.reason.contains("BEP44"));

        let data_dir = tmp.path().join(".ouinet");
        assert_eq!(fs::read(data_dir.join("a.html.desc")).unwrap(), b"desc");
        assert_eq!(fs::read(data_dir.join("a.html.ins-other")).unwrap(), b"other");
        assert!(!data_dir.join("a.html.ins-bep44").exists());
        assert!(!data_dir.join("a.html.link").exists());
    }

    #[tokio::test]
    async fn invalid_prefix_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let agent = FakeAgent::default();
        let err = inject_uris(tmp.path(), &config("pub.example"), &agent, &NoProgress)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<PublishError>().is_some());
        assert!(agent.requests.lock().unwrap().is_empty());
        assert!(!tmp.path().join(".ouinet").exists());
    }

    #[tokio::test]
    async fn unreadable_directory_fails_and_walk_goes_on() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "c").unwrap();
        fs::create_dir_all(tmp.path().join("z")).unwrap();
        fs::write(tmp.path().join("z/d.txt"), "d").unwrap();

        let agent = FakeAgent {
            remove_on_inject: Some(("http://pub.example/a.html".into(), tmp.path().join("sub"))),
            ..Default::default()
        };
        let report = inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].item, tmp.path().join("sub").display().to_string());
        // Root, a.html, z/ and z/d.txt.
        assert_eq!(report.succeeded, 4);

        assert!(!agent
            .requests
            .lock()
            .unwrap()
            .iter()
            .any(|u| u.contains("sub")));
        assert_eq!(
            fs::read(tmp.path().join("z/.ouinet/d.txt.desc")).unwrap(),
            b"http://pub.example/z/d.txt"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifacts_get_regular_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.html"), "a").unwrap();
        let agent = FakeAgent::default();
        inject_uris(tmp.path(), &config("http://pub.example/"), &agent, &NoProgress)
            .await
            .unwrap();

        // Both created with 0666 less the umask.
        let content_mode = fs::metadata(tmp.path().join("a.html")).unwrap().permissions().mode();
        for name in ["a.html.desc", "a.html.link", "a.html.ins-bep44"] {
            let mode = fs::metadata(tmp.path().join(".ouinet").join(name))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, content_mode & 0o777, "{}", name);
        }
    }
}
