use super::iter::{RowIterator, WindowIterator};
use super::{Error, SourceSnapshot};
use row_source::{Connection, Row};

/// Phase of a logical run.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Phase {
    #[default]
    Uninitialized,
    Streaming,
    /// Terminal for the run. `error` is set if the run ended due to a failure.
    Exhausted { error: Option<String> },
}

// Live iteration handle of a streaming run.
pub(crate) enum Live {
    Rows(RowIterator),
    Windows(WindowIterator),
}

/// ResumableContext is the state of one logical run which survives across
/// invocations of a producer. It's owned by the host and passed into each
/// invocation. A context is single-owner: the host serializes invocations.
pub struct ResumableContext {
    pub(crate) is_first_run: bool,
    pub(crate) phase: Phase,
    pub(crate) connection: Option<Box<dyn Connection>>,
    pub(crate) live: Option<Live>,
    pub(crate) source_snapshot: Option<SourceSnapshot>,
    pub(crate) current_run_index: u64,
    pub(crate) max_run_index: u64,
    // Buffered rows, reversed so that popping from the tail preserves source order.
    pub(crate) pending_batch: Vec<Row>,
    pub(crate) done: bool,
    pub(crate) program: Option<batch_lambda::Program>,
    pub(crate) halted: Option<String>,
}

impl Default for ResumableContext {
    fn default() -> Self {
        Self {
            is_first_run: true,
            phase: Phase::Uninitialized,
            connection: None,
            live: None,
            source_snapshot: None,
            current_run_index: 0,
            max_run_index: 0,
            pending_batch: Vec::new(),
            done: false,
            program: None,
            halted: None,
        }
    }
}

impl std::fmt::Debug for ResumableContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumableContext")
            .field("is_first_run", &self.is_first_run)
            .field("phase", &self.phase)
            .field("connected", &self.connection.is_some())
            .field("live", &self.live.is_some())
            .field("source_snapshot", &self.source_snapshot)
            .field("current_run_index", &self.current_run_index)
            .field("max_run_index", &self.max_run_index)
            .field("pending_batch", &self.pending_batch.len())
            .field("done", &self.done)
            .field("compiled", &self.program.is_some())
            .field("halted", &self.halted)
            .finish()
    }
}

impl ResumableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_first_run(&self) -> bool {
        self.is_first_run
    }
    pub fn phase(&self) -> &Phase {
        &self.phase
    }
    pub fn source_snapshot(&self) -> Option<&SourceSnapshot> {
        self.source_snapshot.as_ref()
    }
    pub fn current_run_index(&self) -> u64 {
        self.current_run_index
    }
    pub fn max_run_index(&self) -> u64 {
        self.max_run_index
    }
    pub fn pending_batch(&self) -> &[Row] {
        &self.pending_batch
    }
    pub fn is_done(&self) -> bool {
        self.done
    }
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    // Begin a run, capturing its provenance snapshot.
    pub(crate) fn begin(&mut self, source: &serde_json::Value) -> SourceSnapshot {
        let snapshot = SourceSnapshot::capture(source);
        self.source_snapshot = Some(snapshot.clone());
        self.is_first_run = false;
        snapshot
    }

    // Advance the run index of a continuing run, returning its snapshot.
    pub(crate) fn resume(&mut self) -> SourceSnapshot {
        self.current_run_index += 1;
        self.source_snapshot
            .clone()
            .unwrap_or_else(|| SourceSnapshot::capture(&serde_json::Value::Null))
    }

    // Record that the run has more data to produce.
    pub(crate) fn more(&mut self) {
        self.phase = Phase::Streaming;
        self.max_run_index = self.current_run_index + 1;
    }

    // Mark the run as exhausted, releasing its live iterator and connection.
    // A failure to destroy the connection is returned.
    pub(crate) async fn exhaust(&mut self, error: Option<String>) -> Result<(), Error> {
        if let Some(error) = &error {
            tracing::warn!(%error, run_index = self.current_run_index, "run ended with an error");
        } else {
            tracing::debug!(run_index = self.current_run_index, "run is exhausted");
        }
        self.phase = Phase::Exhausted { error };
        self.done = true;
        self.max_run_index = self.current_run_index;
        Ok(self.release().await?)
    }

    /// Close the run, releasing its live iterator, compiled program, and
    /// connection. Closing an already-closed context does nothing.
    /// A failure to destroy the connection is logged.
    pub async fn close(&mut self) {
        self.program = None;
        let _ = self.release().await;
    }

    async fn release(&mut self) -> Result<(), row_source::Error> {
        self.live = None;
        self.pending_batch.clear();

        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        connection.destroy().await.map_err(|error| {
            tracing::warn!(%error, "failed to destroy connection");
            error
        })
    }
}
