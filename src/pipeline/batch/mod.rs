//! Batch orchestration: input expansion, the worker-pool runner and the
//! result model handed back to callers.

pub mod types;
pub mod input;
pub mod runner;

pub use input::expand_directory;
pub use runner::{run_batch, BatchRunner, CollectingSink, DiscardSink, PreparedSink};
pub use types::*;
