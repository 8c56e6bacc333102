//! batch-lambda compiles user-supplied transformation programs once, and then
//! invokes them over successive batches of JSON documents.
//!
//! A program is a block of SQLite statements evaluated within a private,
//! in-memory database. Every statement but the last is run once at compile
//! time, and may create tables or other state which persists across
//! invocations. The last statement is prepared once and invoked per batch,
//! with the batch bound to its `$input` parameter as a JSON array.

mod block;
mod program;

pub use block::split_statements;
pub use program::{Program, INPUT_PARAM};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("program contains illegal NULL characters")]
    NullString(#[from] std::ffi::NulError),
    #[error(
        "program has ambiguous trailing non-whitespace content without a closing ';' semicolon: {trailing}"
    )]
    BlockTrailingContent { trailing: String },
    #[error("program has no statements")]
    Empty,
    #[error("program setup statement at index {index} failed")]
    Setup {
        index: usize,
        #[source]
        err: rusqlite::Error,
    },
    #[error("failed to compile program query: {query}")]
    Compile {
        query: String,
        #[source]
        err: rusqlite::Error,
    },
    #[error("program references parameter {name}, but only {INPUT_PARAM} is available")]
    UnknownParameter { name: String },
    #[error("failed to encode program input")]
    Input(#[from] serde_json::Error),
    #[error("script execution error: {0}")]
    ScriptExecution(#[source] rusqlite::Error),
}

impl Error {
    /// Is this an error raised while running the program over a batch,
    /// as opposed to an error in compiling the program?
    pub fn is_script_execution(&self) -> bool {
        matches!(self, Self::ScriptExecution(_))
    }
}
