// In-memory source used by trigger tests. It understands the count and
// LIMIT/OFFSET page queries issued by an IntervalTrigger.

use futures::StreamExt;
use row_source::{Connection, ConnectionConfig, Connector, Error, Row, RowStream, Statement};
use serde_json::{json, Value};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeSource {
    pub rows: Mutex<Vec<Row>>,
    pub executed: Mutex<Vec<String>>,
    pub destroys: AtomicUsize,
    // Number of upcoming count queries which fail.
    pub failing_counts: AtomicUsize,
    // Fail streams after this many rows.
    pub stream_fault_after: Mutex<Option<usize>>,
}

impl FakeSource {
    pub fn with_rows(n: usize) -> Arc<Self> {
        let source = Self::default();
        *source.rows.lock().unwrap() = (1..=n)
            .map(|id| {
                serde_json::from_value(json!({"id": id, "name": format!("row-{id}")})).unwrap()
            })
            .collect();
        Arc::new(source)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

pub struct FakeConnector(pub Arc<FakeSource>);

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>, Error> {
        Ok(Box::new(FakeConnection(self.0.clone())))
    }
}

struct FakeConnection(Arc<FakeSource>);

#[async_trait::async_trait]
impl Connection for FakeConnection {
    async fn execute(&self, sql: &str, _binds: &[Value]) -> Result<Vec<Row>, Error> {
        self.0.executed.lock().unwrap().push(sql.to_string());

        if sql.starts_with("SELECT COUNT(*)") {
            let failing = self.0.failing_counts.load(Ordering::SeqCst);
            if failing != 0 {
                self.0.failing_counts.store(failing - 1, Ordering::SeqCst);
                return Err(Error::query(sql, "no such table"));
            }
            let count = self.0.rows.lock().unwrap().len();
            return Ok(vec![serde_json::from_value(json!({ "COUNT": count })).unwrap()]);
        }

        let parse = |keyword: &str| -> usize {
            let (_, rest) = sql.rsplit_once(keyword).unwrap();
            rest.split_whitespace().next().unwrap().parse().unwrap()
        };
        let (limit, offset) = (parse(" LIMIT "), parse(" OFFSET "));

        let rows = self.0.rows.lock().unwrap();
        Ok(rows.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn stream_query(&self, _sql: &str, _binds: &[Value]) -> Result<Box<dyn Statement>, Error> {
        Ok(Box::new(FakeStatement(self.0.clone())))
    }

    async fn destroy(&self) -> Result<(), Error> {
        if self.0.destroys.fetch_add(1, Ordering::SeqCst) != 0 {
            return Err(Error::Connection("connection is already closed".to_string()));
        }
        Ok(())
    }
}

struct FakeStatement(Arc<FakeSource>);

#[async_trait::async_trait]
impl Statement for FakeStatement {
    async fn total_row_count(&self) -> Result<u64, Error> {
        Ok(self.0.rows.lock().unwrap().len() as u64)
    }

    fn stream_rows(&self, _window: Option<Range<u64>>) -> RowStream {
        let rows: Vec<Result<Row, Error>> = self.0.rows.lock().unwrap().iter().cloned().map(Ok).collect();
        let fault = *self.0.stream_fault_after.lock().unwrap();

        match fault {
            Some(n) => futures::stream::iter(rows.into_iter().take(n))
                .chain(futures::stream::iter([Err(Error::Stream("driver fault".to_string()))]))
                .boxed(),
            None => futures::stream::iter(rows).boxed(),
        }
    }
}
