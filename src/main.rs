//! # Ouinet Publish CLI (`ouinet-publish`)
//!
//! Prepares a content directory and publishes it to Ouinet through a local
//! Ouinet client.
//!
//! ## Usage
//!
//! ```bash
//! ouinet-publish [OPTIONS] <DIR> <ACTION>...
//! ```
//!
//! ## Actions
//!
//! | Action | Description |
//! |--------|-------------|
//! | `index` | Create per-directory index files |
//! | `inject` | Request content via the client to inject it; store descriptors beside content |
//! | `seed` | Upload files to the client for it to seed their data |
//!
//! Actions run in the order above whatever order they are given in. The
//! exit status is 0 if every selected action succeeded for every item,
//! 2 if any failed, 124 if `--deadline` expired and 130 on interrupt.
//!
//! ## Examples
//!
//! ```bash
//! # Create index files, replacing existing ones
//! ouinet-publish --force-index ./site index
//!
//! # Inject and seed through a client listening on another port
//! ouinet-publish --client-proxy localhost:8087 \
//!     --uri-prefix http://example.com/ ./site inject seed
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use ouinet_publish::agent::HttpAgent;
use ouinet_publish::config::{self, PublishConfig};
use ouinet_publish::progress::ProgressMode;
use ouinet_publish::publish::{all_ok, run_actions};
use ouinet_publish::report::Action;

/// Prepare a content directory and publish it to Ouinet.
#[derive(Parser)]
#[command(
    name = "ouinet-publish",
    about = "Prepare a content directory and publish it to Ouinet",
    version
)]
struct Cli {
    /// Optional configuration file (TOML). Command-line options override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// The HOST and PORT of the Ouinet client's HTTP proxy (default: localhost:8080).
    #[arg(long, value_name = "HOST:PORT")]
    client_proxy: Option<String>,

    /// The NAME of the index file to be created in each subdirectory (default: index.html).
    #[arg(long, value_name = "NAME")]
    index_name: Option<String>,

    /// Overwrite existing index files.
    #[arg(long)]
    force_index: bool,

    /// URI to prepend to content paths when injecting (no default).
    #[arg(long, value_name = "URI")]
    uri_prefix: Option<String>,

    /// Timeout for each request to the client, in seconds (default: 300).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Stop the whole run after this many seconds.
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,

    /// The content directory to prepare and publish.
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Actions to perform.
    #[arg(value_name = "ACTION", value_enum, required = true, num_args = 1..)]
    actions: Vec<Action>,
}

fn build_config(cli: &Cli) -> Result<PublishConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => PublishConfig::default(),
    };

    if let Some(proxy) = &cli.client_proxy {
        cfg.client.proxy = proxy.clone();
    }
    if let Some(timeout) = cli.timeout {
        cfg.client.timeout_secs = timeout;
    }
    if let Some(name) = &cli.index_name {
        cfg.index.name = name.clone();
    }
    if cli.force_index {
        cfg.index.overwrite = true;
    }
    if let Some(prefix) = &cli.uri_prefix {
        cfg.inject.uri_prefix = prefix.clone();
    }

    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = build_config(&cli)?;

    if !cli.directory.is_dir() {
        bail!("Content directory does not exist: {}", cli.directory.display());
    }

    let agent = HttpAgent::new(&cfg)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let run = run_actions(
        &cli.directory,
        &cfg,
        &cli.actions,
        &agent,
        progress.as_ref(),
    );
    let deadline = async {
        match cli.deadline {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    // Artifacts are replaced atomically, so dropping the run midway leaves
    // every metadata file either old or new.
    let results = tokio::select! {
        results = run => results,
        _ = deadline => {
            eprintln!("Deadline expired, stopping.");
            std::process::exit(124);
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, stopping.");
            std::process::exit(130);
        }
    };

    if !all_ok(&results) {
        std::process::exit(2);
    }
    Ok(())
}
