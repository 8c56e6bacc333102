use super::lifecycle::Lifecycle;
use super::{DoneReason, Emitter, Error, PollConfig};
use row_source::{Connection, ConnectionConfig, Connector, Row};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};

/// IntervalTrigger polls a table on a fixed period. Each cycle counts the
/// table, then emits its query's rows a page at a time, pausing between
/// pages. The first cycle begins immediately.
pub struct IntervalTrigger {
    inner: Arc<Inner>,
}

struct Inner {
    config: PollConfig,
    connection: Arc<dyn Connection>,
    emitter: Arc<dyn Emitter>,
    lifecycle: Lifecycle,
    cycles: AtomicU64,
}

impl IntervalTrigger {
    pub async fn start(
        connector: &dyn Connector,
        connection: &ConnectionConfig,
        config: PollConfig,
        emitter: Arc<dyn Emitter>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let connection: Arc<dyn Connection> = connector.connect(connection).await?.into();

        let inner = Arc::new(Inner {
            config,
            connection,
            emitter,
            lifecycle: Lifecycle::new(),
            cycles: AtomicU64::new(0),
        });
        tracing::info!(
            table = %inner.config.table,
            interval = ?inner.config.interval,
            "starting interval trigger"
        );

        inner.clone().trigger();
        inner
            .lifecycle
            .set_ticker(tokio::spawn(inner.clone().run_ticker()));

        Ok(Self { inner })
    }

    /// Begin a cycle now, outside of the schedule.
    /// Returns false if the cycle was skipped because one is already running.
    pub fn manual_trigger(&self) -> bool {
        self.inner.clone().trigger()
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// Stop the trigger, waiting for a running cycle to finish its current
    /// page. The emitter is told the trigger is done and the connection is
    /// released. Closing an already-closed trigger does nothing.
    pub async fn close(&self) {
        if !self.inner.lifecycle.shutdown().await {
            return;
        }
        self.inner.emitter.done(DoneReason::Closed);

        if let Err(error) = self.inner.connection.destroy().await {
            tracing::warn!(%error, "failed to destroy connection");
        }
        tracing::info!(table = %self.inner.config.table, "closed interval trigger");
    }
}

impl Drop for IntervalTrigger {
    fn drop(&mut self) {
        self.inner.lifecycle.cancel.cancel();
    }
}

impl Inner {
    fn trigger(self: Arc<Self>) -> bool {
        let this = self.clone();
        self.lifecycle.try_spawn(async move {
            let cycle = this.cycles.fetch_add(1, Ordering::SeqCst);

            match this.run_cycle(cycle).await {
                Ok(emitted) => tracing::debug!(cycle, emitted, "poll cycle finished"),
                Err(error) => {
                    tracing::error!(cycle, %error, "poll cycle failed");
                    this.emitter.done(DoneReason::Failed);
                }
            }
        })
    }

    async fn run_ticker(self: Arc<Self>) {
        let period = self.config.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.lifecycle.cancel.cancelled() => {
                    tracing::debug!("interval trigger signalled to stop");
                    return;
                }
                _ = interval.tick() => {}
            }
            self.clone().trigger();
        }
    }

    // Run a single cycle, returning the number of rows emitted.
    #[tracing::instrument(skip(self), fields(table = %self.config.table))]
    async fn run_cycle(&self, cycle: u64) -> Result<u64, Error> {
        let PollConfig {
            limit,
            batch_interval,
            ..
        } = &self.config;

        let count = row_count(&self.connection.execute(&self.config.count_sql(), &[]).await?);
        if count == 0 {
            tracing::warn!("no rows found in table");
            self.emitter.done(DoneReason::Empty);
            return Ok(0);
        }
        tracing::info!(count, "polling table");

        let mut offset = 0;
        let mut emitted = 0;

        while offset < count {
            let rows = self
                .connection
                .execute(&self.config.page_sql(offset), &[])
                .await?;

            if rows.is_empty() {
                tracing::debug!(offset, "page is empty; ending cycle early");
                break;
            }
            emitted += rows.len() as u64;
            tracing::debug!(offset, rows = rows.len(), "emitting page");

            // Delivery is not awaited: the delay between pages bounds the pace instead.
            let _ack = self
                .emitter
                .emit(rows.into_iter().map(super::pushed_item).collect());

            offset += limit;
            if offset >= count {
                break;
            }

            tokio::select! {
                _ = self.lifecycle.cancel.cancelled() => {
                    tracing::info!(offset, count, "poll cycle cancelled");
                    return Ok(emitted);
                }
                _ = tokio::time::sleep(*batch_interval) => {}
            }
        }

        self.emitter.done(DoneReason::Completed);
        Ok(emitted)
    }
}

// Extract the "count" column of a count query, treating a missing or
// non-numeric count as zero.
fn row_count(rows: &[Row]) -> u64 {
    rows.first()
        .and_then(|row| {
            row.iter()
                .find(|(column, _)| column.eq_ignore_ascii_case("count"))
                .map(|(_, value)| value)
        })
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}
