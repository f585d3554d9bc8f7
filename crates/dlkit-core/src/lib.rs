//! dlkit core - download engine
//!
//! This crate downloads HTTP resources to files. A [`DownloadTask`] handles a
//! single transfer with byte-range resume, retries, pause and cancellation; a
//! [`Scheduler`] runs many tasks with a concurrency bound and reports batch
//! progress. Settings are persisted by [`SettingsStore`].

mod engine;
mod error;
mod storage;

pub use engine::*;
pub use error::*;
pub use storage::*;

pub use dlkit_types as types;
