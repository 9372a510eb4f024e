//! Library for applying patch catalogues to binary memory images.
//!
//! This crate wraps the [`patchwork_image`] engine with everything around it:
//! JSON patch catalogues, payload files, the decrypt/patch/encrypt job
//! pipeline, and progress reporting.
//!
//! # Overview
//!
//! A [`Catalogue`] is loaded and resolved against a [`PayloadSource`] into a
//! list of [`Job`]s. A [`JobRunner`] then runs them, handing every step to a
//! [`PatchProgress`] implementation.
//!
//! # Example
//!
//! ```no_run
//! use patchwork_util::{Catalogue, DirectorySource, JobRunner, Platform, SilentProgress};
//! use std::path::Path;
//!
//! let catalogue = Catalogue::load(Path::new("c64-elite.json")).expect("failed to load catalogue");
//! let source = DirectorySource::new("disk");
//! let jobs = catalogue
//!     .resolve(Some(Platform::Pal), &source)
//!     .expect("invalid catalogue");
//!
//! let runner = JobRunner::new(SilentProgress, false);
//! runner
//!     .run_all(&jobs, source.root(), Path::new("out"))
//!     .expect("patching failed");
//! ```
//!
//! # Custom progress reporting
//!
//! You can implement the [`PatchProgress`] trait to receive a record of every
//! applied patch.

pub mod catalogue;
pub mod job;
pub mod payload;
pub mod progress;

pub use self::catalogue::{Catalogue, CatalogueError, Job, Platform};
pub use self::job::{JobError, JobReport, JobRunner};
pub use self::payload::{DirectorySource, MemorySource, PayloadError, PayloadSource};
pub use self::progress::{PatchProgress, SilentProgress};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;

use sha2::{Digest, Sha256};

/// Returns the SHA-256 of `data` as lowercase hex.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
