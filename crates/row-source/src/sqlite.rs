use super::{convert, Connection, ConnectionConfig, Connector, Error, Row, RowStream, Statement};
use futures::StreamExt;
use rusqlite::OpenFlags;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// SqliteConnector connects to SQLite database files.
/// The `account` of a [`ConnectionConfig`] is the path of the database,
/// which must already exist.
///
/// Each streamed statement reads through its own read-only connection, so a
/// long-lived row stream never blocks queries issued over the primary connection.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    buffer: usize,
}

/// Number of rows a streamed statement reads ahead of its consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

const CLOSED: &str = "connection is already closed";

impl SqliteConnector {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_STREAM_BUFFER)
    }

    /// Use a read-ahead buffer of `buffer` rows for streamed statements.
    /// The producer of a stream pauses whenever its buffer is full.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
        }
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, Error> {
        let path = PathBuf::from(&config.account);
        tracing::debug!(
            account = %config.account,
            username = ?config.username,
            authentication = ?config.authentication,
            "connecting to sqlite source"
        );

        let open_path = path.clone();
        let db = blocking(move || {
            rusqlite::Connection::open_with_flags(
                &open_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|err| Error::Connection(format!("{}: {err}", open_path.display())))
        })
        .await?;

        Ok(Box::new(SqliteConnection {
            path,
            db: Arc::new(Mutex::new(Some(db))),
            buffer: self.buffer,
        }))
    }
}

struct SqliteConnection {
    path: PathBuf,
    db: Arc<Mutex<Option<rusqlite::Connection>>>,
    buffer: usize,
}

impl SqliteConnection {
    // Run `f` over the open primary connection on a blocking thread.
    async fn with_db<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, Error> + Send + 'static,
    {
        let db = self.db.clone();

        blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| Error::Connection("connection lock is poisoned".to_string()))?;
            let db = guard
                .as_ref()
                .ok_or_else(|| Error::Connection(CLOSED.to_string()))?;
            f(db)
        })
        .await
    }
}

#[async_trait::async_trait]
impl Connection for SqliteConnection {
    async fn execute(&self, sql: &str, binds: &[serde_json::Value]) -> Result<Vec<Row>, Error> {
        let sql = sql.to_string();
        let binds = binds.to_vec();

        self.with_db(move |db| query_rows(db, &sql, &binds).map_err(|err| Error::query(&sql, err)))
            .await
    }

    async fn stream_query(
        &self,
        sql: &str,
        binds: &[serde_json::Value],
    ) -> Result<Box<dyn Statement>, Error> {
        let sql = sql.trim().trim_end_matches(';').to_string();

        // Prepare once to surface syntax errors as a QueryError now, rather
        // than as a StreamError once rows are requested.
        let check = sql.clone();
        self.with_db(move |db| {
            db.prepare(&check)
                .map(|_| ())
                .map_err(|err| Error::query(&check, err))
        })
        .await?;

        Ok(Box::new(SqliteStatement {
            path: self.path.clone(),
            db: self.db.clone(),
            sql,
            binds: binds.to_vec(),
            buffer: self.buffer,
        }))
    }

    async fn destroy(&self) -> Result<(), Error> {
        let db = self.db.clone();

        blocking(move || {
            let db = db
                .lock()
                .map_err(|_| Error::Connection("connection lock is poisoned".to_string()))?
                .take()
                .ok_or_else(|| Error::Connection(CLOSED.to_string()))?;

            db.close()
                .map_err(|(_, err)| Error::Connection(err.to_string()))
        })
        .await?;

        tracing::debug!(path = %self.path.display(), "closed sqlite source");
        Ok(())
    }
}

struct SqliteStatement {
    path: PathBuf,
    db: Arc<Mutex<Option<rusqlite::Connection>>>,
    sql: String,
    binds: Vec<serde_json::Value>,
    buffer: usize,
}

impl SqliteStatement {
    fn is_closed(&self) -> bool {
        self.db.lock().map(|db| db.is_none()).unwrap_or(true)
    }
}

#[async_trait::async_trait]
impl Statement for SqliteStatement {
    async fn total_row_count(&self) -> Result<u64, Error> {
        let sql = format!("SELECT COUNT(*) FROM ({})", self.sql);
        let binds = self.binds.clone();
        let db = self.db.clone();

        blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| Error::Connection("connection lock is poisoned".to_string()))?;
            let db = guard
                .as_ref()
                .ok_or_else(|| Error::Connection(CLOSED.to_string()))?;

            let count: i64 = db
                .query_row(
                    &sql,
                    rusqlite::params_from_iter(binds.iter().map(convert::bind_value)),
                    |row| row.get(0),
                )
                .map_err(|err| Error::query(&sql, err))?;

            Ok(count.max(0) as u64)
        })
        .await
    }

    fn stream_rows(&self, window: Option<Range<u64>>) -> RowStream {
        if self.is_closed() {
            return futures::stream::once(async { Err(Error::Stream(CLOSED.to_string())) })
                .boxed();
        }

        let mut binds = self.binds.clone();
        let sql = match window {
            Some(Range { start, end }) => {
                binds.push(serde_json::Value::from(end.saturating_sub(start)));
                binds.push(serde_json::Value::from(start));
                format!("SELECT * FROM ({}) LIMIT ? OFFSET ?", self.sql)
            }
            None => self.sql.clone(),
        };
        let path = self.path.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(self.buffer);

        tokio::task::spawn_blocking(move || {
            if let Err(err) = produce_rows(&path, &sql, &binds, &tx) {
                let _ = tx.blocking_send(Err(err));
            }
        });

        tokio_stream::wrappers::ReceiverStream::new(rx).boxed()
    }
}

// Read rows of `sql` and send each to `tx`, which applies back-pressure
// when its buffer is full. Returns early if the receiver goes away.
fn produce_rows(
    path: &Path,
    sql: &str,
    binds: &[serde_json::Value],
    tx: &tokio::sync::mpsc::Sender<Result<Row, Error>>,
) -> Result<(), Error> {
    let stream_err = |err: rusqlite::Error| Error::Stream(err.to_string());

    let db = rusqlite::Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(stream_err)?;

    let mut stmt = db.prepare(sql).map_err(stream_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(binds.iter().map(convert::bind_value)))
        .map_err(stream_err)?;

    let mut sent = 0usize;
    while let Some(row) = rows.next().map_err(stream_err)? {
        let row = convert::row_to_json(&columns, row).map_err(stream_err)?;

        if tx.blocking_send(Ok(row)).is_err() {
            tracing::debug!(sent, "row stream was dropped by its consumer");
            return Ok(());
        }
        sent += 1;
    }
    tracing::trace!(sent, "row stream finished");

    Ok(())
}

fn query_rows(
    db: &rusqlite::Connection,
    sql: &str,
    binds: &[serde_json::Value],
) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = db.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(binds.iter().map(convert::bind_value)))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(convert::row_to_json(&columns, row)?);
    }
    Ok(out)
}

async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| Error::Connection(format!("blocking sqlite task failed: {err}")))?
}
