//! paginator turns a single query into a resumable, incrementally delivered
//! sequence of result batches.
//!
//! The host re-invokes a producer once per delivered batch. State which must
//! survive across invocations (the live connection and cursor, the run's
//! provenance snapshot, buffered rows, completion) lives in a
//! [`ResumableContext`] which the host owns and passes into every call,
//! typically through a [`ContextRegistry`] keyed on node instance and run.

mod code;
mod context;
mod cursor;
mod item;
mod iter;
pub mod lineage;
mod paginate;
mod registry;

pub use code::CodeStep;
pub use context::{Phase, ResumableContext};
pub use cursor::BatchCursor;
pub use item::{Invocation, OutputItem, Outputs};
pub use iter::Step;
pub use lineage::{Lineage, PairedItem, SourceSnapshot};
pub use paginate::{LoopConfig, Paginator, Strategy};
pub use registry::{ContextRegistry, RunKey};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] row_source::Error),
    #[error(transparent)]
    Program(#[from] batch_lambda::Error),
    #[error("run was halted by an earlier script execution error: {0}")]
    Halted(String),
    #[error("invalid loop configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_script_execution(&self) -> bool {
        matches!(self, Self::Program(err) if err.is_script_execution())
    }
}
