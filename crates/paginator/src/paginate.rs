use super::context::Live;
use super::iter::{RowIterator, WindowIterator};
use super::{lineage, Error, Invocation, OutputItem, Outputs, Phase, ResumableContext};
use row_source::{ConnectionConfig, Connector, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// LoopConfig is the query of a paginated run, and the strategy by which
/// its rows are delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoopConfig {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<serde_json::Value>,
    #[serde(default)]
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Strategy {
    /// Stream the query and deliver one row per invocation.
    #[default]
    RowAtATime,
    /// Count the query, then deliver each `[start, end)` window of `window`
    /// rows as one invocation.
    Windowed {
        #[serde(default = "default_window")]
        window: u64,
    },
    /// Fetch `batch_size` rows at a time into a buffer, and deliver one
    /// buffered row per invocation.
    Prefetch {
        #[serde(default = "default_batch_size", rename = "batchSize")]
        batch_size: u64,
    },
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), Error> {
        match self.strategy {
            Strategy::Windowed { window: 0 } => {
                Err(Error::Config("window must be positive".to_string()))
            }
            Strategy::Prefetch { batch_size: 0 } => {
                Err(Error::Config("batchSize must be positive".to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn default_window() -> u64 {
    1
}

fn default_batch_size() -> u64 {
    1000
}

/// Paginator produces the next batch of a run on each invocation.
pub struct Paginator {
    connector: Arc<dyn Connector>,
    connection: ConnectionConfig,
    config: LoopConfig,
}

impl Paginator {
    pub fn new(connector: Arc<dyn Connector>, connection: ConnectionConfig, config: LoopConfig) -> Self {
        Self {
            connector,
            connection,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Produce the next output of the run tracked by `ctx`.
    ///
    /// The first invocation of a run connects, opens the query, and captures
    /// the provenance snapshot of `invocation`. Each invocation then delivers
    /// one unit of work, being a row or a window of rows. Once the source is
    /// exhausted the run is done, and this and every further invocation
    /// returns empty outputs.
    #[tracing::instrument(level = "debug", skip_all, fields(run_index = ctx.current_run_index))]
    pub async fn produce_next(
        &self,
        ctx: &mut ResumableContext,
        invocation: &Invocation,
    ) -> Result<Outputs, Error> {
        if ctx.done {
            return Ok(Outputs::finished());
        }

        let snapshot = if ctx.is_first_run {
            self.config.validate()?;
            let snapshot = ctx.begin(&invocation.source);

            if let Err(err) = self.start(ctx).await {
                // The failure which ended the run takes precedence over one in releasing it.
                let _ = ctx.exhaust(Some(err.to_string())).await;
                return Err(err);
            }
            snapshot
        } else {
            ctx.resume()
        };

        let step = match self.config.strategy {
            Strategy::RowAtATime => next_row(ctx).await,
            Strategy::Windowed { .. } => next_window(ctx).await,
            Strategy::Prefetch { .. } => next_buffered(ctx).await,
        };

        match step {
            Ok(Some(rows)) => {
                ctx.more();

                let items = rows.into_iter().map(OutputItem::from_row).collect();
                Ok(Outputs {
                    primary: lineage::pair_all(items, &snapshot),
                    completion: Vec::new(),
                    done: false,
                })
            }
            Ok(None) => {
                ctx.exhaust(None).await?;
                Ok(Outputs::finished())
            }
            Err(err) => {
                let _ = ctx.exhaust(Some(err.to_string())).await;
                Err(err)
            }
        }
    }

    // Connect and open the live iterator of a new run.
    async fn start(&self, ctx: &mut ResumableContext) -> Result<(), Error> {
        let LoopConfig {
            query,
            binds,
            strategy,
        } = &self.config;

        let connection = self.connector.connect(&self.connection).await?;
        let connection = ctx.connection.insert(connection);
        let statement = connection.stream_query(query, binds).await?;

        ctx.live = match *strategy {
            Strategy::RowAtATime => Some(Live::Rows(RowIterator::new(statement.stream_rows(None)))),
            Strategy::Windowed { window } => WindowIterator::open(statement, window)
                .await?
                .map(Live::Windows),
            Strategy::Prefetch { batch_size } => WindowIterator::open(statement, batch_size)
                .await?
                .map(Live::Windows),
        };
        ctx.phase = Phase::Streaming;

        tracing::debug!(?strategy, empty = ctx.live.is_none(), "started run");
        Ok(())
    }
}

async fn next_row(ctx: &mut ResumableContext) -> Result<Option<Vec<Row>>, Error> {
    let Some(Live::Rows(rows)) = ctx.live.as_mut() else {
        return Ok(None);
    };
    // The terminal step carries no row and is never emitted.
    Ok(rows.next().await?.value.map(|row| vec![row]))
}

async fn next_window(ctx: &mut ResumableContext) -> Result<Option<Vec<Row>>, Error> {
    let Some(Live::Windows(windows)) = ctx.live.as_mut() else {
        return Ok(None);
    };
    windows.next_window().await
}

async fn next_buffered(ctx: &mut ResumableContext) -> Result<Option<Vec<Row>>, Error> {
    if ctx.pending_batch.is_empty() {
        let Some(Live::Windows(windows)) = ctx.live.as_mut() else {
            return Ok(None);
        };
        let Some(mut batch) = windows.next_window().await? else {
            return Ok(None);
        };
        tracing::debug!(rows = batch.len(), "prefetched batch");

        batch.reverse();
        ctx.pending_batch = batch;
    }
    Ok(ctx.pending_batch.pop().map(|row| vec![row]))
}
