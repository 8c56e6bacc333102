use super::{lineage, Error, Invocation, OutputItem, Outputs, Phase, ResumableContext};
use batch_lambda::Program;
use serde_json::Value;

/// CodeStep transforms the items of each invocation through a program,
/// compiled once per run and held by the run's context.
#[derive(Debug, Clone)]
pub struct CodeStep {
    source: String,
}

impl CodeStep {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Invoke the program of the run tracked by `ctx` over the items of
    /// `invocation`, compiling it first if this is the run's first invocation.
    ///
    /// A script execution error is returned for the invocation in which it
    /// occurs and halts the run. Outputs already returned remain valid.
    pub fn produce_next(
        &self,
        ctx: &mut ResumableContext,
        invocation: &Invocation,
    ) -> Result<Outputs, Error> {
        if let Some(error) = &ctx.halted {
            return Err(Error::Halted(error.clone()));
        }

        let snapshot = if ctx.is_first_run {
            let snapshot = ctx.begin(&invocation.source);

            match Program::compile(&self.source) {
                Ok(program) => ctx.program = Some(program),
                Err(err) => return Err(halt(ctx, err.into())),
            }
            snapshot
        } else {
            ctx.resume()
        };

        let Some(program) = ctx.program.as_ref() else {
            return Err(Error::Halted("program is closed".to_string()));
        };

        let batch: Vec<Value> = invocation
            .items
            .iter()
            .map(|item| Value::Object(item.json.clone()))
            .collect();

        let docs = match program.invoke(&batch) {
            Ok(docs) => docs,
            Err(err) => return Err(halt(ctx, err.into())),
        };
        tracing::debug!(
            inputs = batch.len(),
            outputs = docs.len(),
            run_index = ctx.current_run_index,
            "invoked program"
        );
        ctx.more();

        let items = docs.into_iter().map(OutputItem::from_document).collect();
        Ok(Outputs {
            primary: lineage::pair_all(items, &snapshot),
            completion: Vec::new(),
            done: false,
        })
    }
}

fn halt(ctx: &mut ResumableContext, err: Error) -> Error {
    tracing::error!(error = %err, run_index = ctx.current_run_index, "program failed; halting run");

    ctx.halted = Some(err.to_string());
    ctx.phase = Phase::Exhausted {
        error: Some(err.to_string()),
    };
    ctx.max_run_index = ctx.current_run_index;
    err
}
