//! Download engine
//!
//! - [`DownloadTask`]: one resumable HTTP transfer with retry, pause and cancel
//! - [`Scheduler`]: bounded-concurrency execution of many tasks
//! - [`EventSink`]: delivery of [`dlkit_types::CoreEvent`]s
//! - [`PlatformDownloadHandler`]: background/notification hooks

mod download_task;
mod events;
mod platform;
mod scheduler;

pub use download_task::*;
pub use events::*;
pub use platform::*;
pub use scheduler::*;
