use super::RunFile;
use anyhow::Context;
use paginator::{CodeStep, ContextRegistry, Invocation, OutputItem, Paginator, RunKey};
use poller::{DoneReason, Event, IntervalTrigger, RowTrigger};
use row_source::SqliteConnector;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

/// Totals of a delivery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Number of non-empty batches delivered.
    pub batches: u64,
    /// Number of items written.
    pub items: u64,
}

/// Drive the paginated run of `file` to completion, writing each delivered
/// item to `out` as a line of JSON. Batches pass through the run file's
/// program, if it has one.
pub async fn run_loop(file: &RunFile, out: &mut dyn Write) -> anyhow::Result<Summary> {
    let config = file
        .loop_
        .clone()
        .context("run file has no `loop` section")?;

    let paginator = Paginator::new(
        Arc::new(SqliteConnector::new()),
        file.connection.clone(),
        config,
    );
    let step = file.program.as_deref().map(CodeStep::new);

    let mut registry = ContextRegistry::new();
    let result = drive(file, &paginator, step.as_ref(), &mut registry, out).await;
    registry.close_all().await;

    let summary = result?;
    tracing::info!(batches = summary.batches, items = summary.items, "run complete");
    Ok(summary)
}

async fn drive(
    file: &RunFile,
    paginator: &Paginator,
    step: Option<&CodeStep>,
    registry: &mut ContextRegistry,
    out: &mut dyn Write,
) -> anyhow::Result<Summary> {
    let (source_key, program_key) = (RunKey::new("source", 0), RunKey::new("program", 0));
    let invocation = Invocation {
        source: file.source.clone(),
        items: Vec::new(),
    };
    let mut summary = Summary::default();

    loop {
        let outputs = paginator
            .produce_next(registry.context(&source_key), &invocation)
            .await
            .context("failed to produce the next batch")?;

        if outputs.done {
            return Ok(summary);
        }

        let items = match step {
            Some(step) => {
                let invocation = Invocation {
                    source: file.source.clone(),
                    items: outputs.primary,
                };
                step.produce_next(registry.context(&program_key), &invocation)
                    .with_context(|| format!("program failed on batch {}", summary.batches))?
                    .primary
            }
            None => outputs.primary,
        };

        summary.batches += 1;
        summary.items += write_items(out, &items)?;
    }
}

/// Poll the table of `file`, writing emitted items to `out` until
/// `max_cycles` cycles have finished or `shutdown` resolves. Cycles which
/// found no rows or which failed count as finished.
pub async fn run_poll(
    file: &RunFile,
    out: &mut dyn Write,
    max_cycles: Option<u64>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Summary> {
    let config = file
        .poll
        .clone()
        .context("run file has no `poll` section")?;

    let (emitter, mut rx) = poller::channel();
    let trigger = IntervalTrigger::start(
        &SqliteConnector::new(),
        &file.connection,
        config,
        Arc::new(emitter),
    )
    .await
    .context("failed to start interval trigger")?;

    let mut summary = Summary::default();
    let mut completed = 0;
    tokio::pin!(shutdown);

    let result = loop {
        let event = tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = rx.recv() => event,
        };

        match event {
            Some(Event::Batch(emission)) => {
                let items = emission.ack();
                summary.batches += 1;

                match write_items(out, &items) {
                    Ok(n) => summary.items += n,
                    Err(err) => break Err(err),
                }
            }
            Some(Event::Done(
                reason @ (DoneReason::Completed | DoneReason::Empty | DoneReason::Failed),
            )) => {
                completed += 1;
                tracing::info!(completed, ?reason, "poll cycle finished");

                if max_cycles.is_some_and(|max| completed >= max) {
                    break Ok(());
                }
            }
            Some(Event::Done(DoneReason::Closed)) | None => break Ok(()),
        }
    };
    trigger.close().await;

    result.map(|()| summary)
}

/// Stream the query of `file`, writing each row to `out` until `max_rows`
/// rows have been written or `shutdown` resolves.
pub async fn run_stream(
    file: &RunFile,
    out: &mut dyn Write,
    max_rows: Option<u64>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Summary> {
    let config = file
        .stream
        .clone()
        .context("run file has no `stream` section")?;

    let (emitter, mut rx) = poller::channel();
    let trigger = RowTrigger::start(
        &SqliteConnector::new(),
        &file.connection,
        config,
        Arc::new(emitter),
    )
    .await
    .context("failed to start row trigger")?;

    let mut summary = Summary::default();
    tokio::pin!(shutdown);

    let result = loop {
        if max_rows.is_some_and(|max| summary.items >= max) {
            break Ok(());
        }
        let event = tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = rx.recv() => event,
        };

        let Some(Event::Batch(emission)) = event else {
            break Ok(());
        };
        summary.batches += 1;

        match write_items(out, &emission.ack()) {
            Ok(n) => summary.items += n,
            Err(err) => break Err(err),
        }
    };
    trigger.close().await;

    result.map(|()| summary)
}

fn write_items(out: &mut dyn Write, items: &[OutputItem]) -> anyhow::Result<u64> {
    for item in items {
        serde_json::to_writer(&mut *out, item).context("failed to serialize item")?;
        writeln!(out).context("failed to write item")?;
    }
    out.flush().context("failed to flush output")?;

    Ok(items.len() as u64)
}
