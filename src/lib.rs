//! # bump_release
//!
//! Release automation for a Python package published to a PyPI-style
//! registry and repackaged by a conda-forge-style feedstock.
//!
//! A release runs strictly in sequence:
//!
//! 1. read the declared version and compute its successor ([`version`])
//! 2. refuse to continue if the registry already has it ([`gate`])
//! 3. write, commit and push the new version ([`git`])
//! 4. build and upload the source distribution ([`publish`])
//! 5. poll the registry until it reports the new version and its sha256
//! 6. rewrite the feedstock recipe and push it ([`recipe`])
//!
//! ## Usage
//!
//! ```bash
//! bump_release next --current 1.2.9     # prints 1.3.0
//! bump_release release --dry-run        # validate without writing
//! bump_release verify --version 1.3.0 --wait
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod git;
pub mod pipeline;
pub mod publish;
pub mod recipe;
pub mod registry;
pub mod trigger;
pub mod version;

pub use config::{PollPolicy, ReleaseConfig, RetryConfig};
pub use error::{ReleaseError, Result};
pub use gate::{
    PublishedRelease, await_published, ensure_unpublished, ensure_unpublished_with_retry,
    verify_published,
};
pub use pipeline::{ReleaseOptions, ReleasePipeline, ReleasePlan, ReleaseReport};
pub use recipe::update_recipe;
pub use registry::{PypiClient, Registry, RegistrySnapshot};
pub use version::{Version, VersionFile};
