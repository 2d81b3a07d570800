//! Pipeline entry points for watcher operations.
//!
//! - `run_watch`: Poll the source on a fixed interval until shutdown
//! - `run_once`: Run a single cycle
//! - `run_inspect`: Extract listings from a saved page
//! - `run_validate`: Check configuration and selectors
//! - `run_reset`: Clear the record store

pub mod cycle;
pub mod dedup;
pub mod inspect;
pub mod scheduler;
pub mod validate;
pub mod watch;
pub mod watermark;

pub use cycle::{CycleReport, CycleStatus, Watcher};
pub use dedup::{DedupFilter, Partition, key_of};
pub use inspect::{InspectReport, run_inspect};
pub use scheduler::{Scheduler, SchedulerReport};
pub use validate::run_validate;
pub use watch::{WatchOptions, build_watcher, run_once, run_reset, run_watch};
pub use watermark::{CycleKind, format_watermark, start_of_day, watermark};
