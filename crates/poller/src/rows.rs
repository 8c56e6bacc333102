use super::lifecycle::Lifecycle;
use super::{DoneReason, Emitter, Error, StreamConfig};
use futures::StreamExt;
use row_source::{Connection, ConnectionConfig, Connector};
use std::sync::Arc;

/// RowTrigger streams the rows of a query, emitting each row as its own
/// batch as it's read. Streaming begins immediately, and again upon each
/// manual trigger.
pub struct RowTrigger {
    inner: Arc<Inner>,
}

struct Inner {
    config: StreamConfig,
    connection: Arc<dyn Connection>,
    emitter: Arc<dyn Emitter>,
    lifecycle: Lifecycle,
}

impl RowTrigger {
    pub async fn start(
        connector: &dyn Connector,
        connection: &ConnectionConfig,
        config: StreamConfig,
        emitter: Arc<dyn Emitter>,
    ) -> Result<Self, Error> {
        let connection: Arc<dyn Connection> = connector.connect(connection).await?.into();

        let inner = Arc::new(Inner {
            config,
            connection,
            emitter,
            lifecycle: Lifecycle::new(),
        });
        inner.clone().trigger();

        Ok(Self { inner })
    }

    /// Stream the query again. Returns false if a stream is already running.
    pub fn manual_trigger(&self) -> bool {
        self.inner.clone().trigger()
    }

    /// Stop streaming and release the connection.
    /// Closing an already-closed trigger does nothing.
    pub async fn close(&self) {
        if !self.inner.lifecycle.shutdown().await {
            return;
        }
        self.inner.emitter.done(DoneReason::Closed);

        if let Err(error) = self.inner.connection.destroy().await {
            tracing::warn!(%error, "failed to destroy connection");
        }
    }
}

impl Drop for RowTrigger {
    fn drop(&mut self) {
        self.inner.lifecycle.cancel.cancel();
    }
}

impl Inner {
    fn trigger(self: Arc<Self>) -> bool {
        let this = self.clone();
        self.lifecycle.try_spawn(async move {
            match this.stream().await {
                Ok(rows) => tracing::info!(rows, "finished stream"),
                Err(error) => tracing::error!(%error, "row stream failed"),
            }
        })
    }

    async fn stream(&self) -> Result<u64, Error> {
        let StreamConfig { query, binds } = &self.config;

        let statement = self.connection.stream_query(query, binds).await?;
        let mut rows = statement.stream_rows(None);
        let mut emitted = 0;

        loop {
            let row = tokio::select! {
                _ = self.lifecycle.cancel.cancelled() => {
                    tracing::debug!(emitted, "row stream cancelled");
                    return Ok(emitted);
                }
                row = rows.next() => row,
            };
            let Some(row) = row else {
                return Ok(emitted);
            };

            let _ack = self.emitter.emit(vec![super::pushed_item(row?)]);
            emitted += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fake::{FakeConnector, FakeSource};
    use crate::{channel, Event};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn start(source: &Arc<FakeSource>) -> (RowTrigger, UnboundedReceiver<Event>) {
        let (emitter, rx) = channel();
        let trigger = RowTrigger::start(
            &FakeConnector(source.clone()),
            &ConnectionConfig::new("fake"),
            StreamConfig {
                query: "select * from product".to_string(),
                binds: Vec::new(),
            },
            Arc::new(emitter),
        )
        .await
        .unwrap();
        (trigger, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Vec<u64>> {
        let mut batches = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::Batch(emission) => batches.push(
                    emission
                        .ack()
                        .iter()
                        .map(|item| item.json["id"].as_u64().unwrap())
                        .collect(),
                ),
                Event::Done(reason) => panic!("unexpected done {reason:?}"),
            }
        }
        batches
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn test_rows_are_emitted_individually() {
        let source = FakeSource::with_rows(3);
        let (trigger, mut rx) = start(&source).await;

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut rx), vec![vec![1], vec![2], vec![3]]);
        assert!(logs_contain("finished stream"));

        // A manual trigger streams the query again.
        assert!(trigger.manual_trigger());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut rx), vec![vec![1], vec![2], vec![3]]);

        trigger.close().await;
        trigger.close().await;
        assert!(matches!(rx.recv().await, Some(Event::Done(DoneReason::Closed))));
        assert_eq!(source.destroys.load(Ordering::SeqCst), 1);
        assert!(!trigger.manual_trigger());
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn test_stream_fault_is_logged() {
        let source = FakeSource::with_rows(3);
        *source.stream_fault_after.lock().unwrap() = Some(1);
        let (trigger, mut rx) = start(&source).await;

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut rx), vec![vec![1]]);
        assert!(logs_contain("row stream failed"));
        assert!(logs_contain("driver fault"));

        trigger.close().await;
    }
}
