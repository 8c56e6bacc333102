//! Row sources are the capability through which queries are run against a
//! row-oriented database: connect, execute a query to completion, or open a
//! streamed statement whose rows are pulled incrementally and optionally
//! within a bounded `[start, end)` window.
//!
//! No retries are performed here. A failed operation surfaces as an [`Error`]
//! carrying the driver's message, and the caller decides what to do with it.

mod config;
pub mod convert;
mod sqlite;

pub use config::{Authentication, ConnectionConfig};
pub use sqlite::SqliteConnector;

use std::ops::Range;

/// Row is a single source record, keyed on column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// RowStream is an asynchronous sequence of rows, in the order produced by the source.
pub type RowStream = futures::stream::BoxStream<'static, Result<Row, Error>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query failed: {message} (query: {sql})")]
    Query { sql: String, message: String },
    #[error("row stream failed: {0}")]
    Stream(String),
}

impl Error {
    pub fn query(sql: &str, err: impl std::fmt::Display) -> Self {
        Self::Query {
            sql: sql.to_string(),
            message: err.to_string(),
        }
    }
}

/// Connector establishes connections to a source.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, Error>;
}

/// Connection is a live session with a source.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Execute `sql` with positional `binds`, returning all of its rows.
    async fn execute(&self, sql: &str, binds: &[serde_json::Value]) -> Result<Vec<Row>, Error>;

    /// Execute `sql` as a streamed statement. Rows are not read until
    /// [`Statement::stream_rows`] is called.
    async fn stream_query(
        &self,
        sql: &str,
        binds: &[serde_json::Value],
    ) -> Result<Box<dyn Statement>, Error>;

    /// Release the connection. Destroying an already-destroyed connection is an error.
    async fn destroy(&self) -> Result<(), Error>;
}

/// Statement is an executed, streamable query.
#[async_trait::async_trait]
pub trait Statement: Send + Sync {
    /// Total number of rows produced by the statement.
    async fn total_row_count(&self) -> Result<u64, Error>;

    /// Stream rows of the statement, restricted to the half-open `window` if given.
    fn stream_rows(&self, window: Option<Range<u64>>) -> RowStream;
}
