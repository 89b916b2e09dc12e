//! # Ouinet Publish
//!
//! Prepare a local content directory and publish it to the Ouinet overlay
//! through a running Ouinet client.
//!
//! Three independent actions work over the same directory tree:
//!
//! - **index**: write a browsable `index.html` into every directory;
//! - **inject**: request every item through the client's proxy with
//!   synchronous injection, and keep the resulting descriptors, descriptor
//!   links and insertion data in a `.ouinet` directory beside the content;
//! - **seed**: upload content and those artifacts to the client so that it
//!   serves them to other peers.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────────────┐
//! │ content    │──▶│  walk    │──▶│ index / inject / │
//! │ tree       │   │          │   │ seed             │
//! └────────────┘   └──────────┘   └────────┬─────────┘
//!                                          │ HTTP via proxy
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │  Ouinet client   │
//!                                 └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ouinet-publish ./site index
//! ouinet-publish --uri-prefix http://example.com/ ./site inject seed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Run configuration and TOML loading |
//! | [`layout`] | Metadata directory and artifact naming |
//! | [`walk`] | Top-down directory walk |
//! | [`index`] | Index page generation |
//! | [`classify`] | Metadata file classification for seeding |
//! | [`agent`] | HTTP access to the Ouinet client |
//! | [`inject`] | Synchronous injection and artifact storage |
//! | [`seed`] | Uploads for seeding |
//! | [`report`] | Per-item outcomes and action reports |
//! | [`progress`] | Progress output on stderr |
//! | [`publish`] | Running the selected actions in order |

pub mod agent;
pub mod classify;
pub mod config;
pub mod error;
pub mod index;
pub mod inject;
pub mod layout;
pub mod progress;
pub mod publish;
pub mod report;
pub mod seed;
pub mod walk;
