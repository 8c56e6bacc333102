use super::{split_statements, Error};
use row_source::convert::value_ref_to_json;
use serde_json::Value;

/// Name of the parameter to which each batch is bound.
pub const INPUT_PARAM: &str = "$input";

/// Program is a compiled transformation, invoked repeatedly with novel batches.
///
/// Each row returned by its query is mapped into a JSON document, with each
/// output column becoming a top-level document property. As a special case,
/// if the query has a single output column whose name starts with "json",
/// as is typical of SQLite's JSON functions, then that column is directly
/// mapped into the output document.
pub struct Program {
    db: rusqlite::Connection,
    query: String,
    // Parameter index of $input, if the query references it.
    input_index: Option<usize>,
    // Output column names, or None if the single output column is the document.
    outputs: Option<Vec<String>>,
}

impl Program {
    /// Compile the program `block`. Setup statements are run immediately,
    /// and the final query is prepared and retained for invocations.
    pub fn compile(block: &str) -> Result<Self, Error> {
        let db = rusqlite::Connection::open_in_memory().map_err(Error::ScriptExecution)?;
        let statements = split_statements(block)?;

        let Some((query, setup)) = statements.split_last() else {
            return Err(Error::Empty);
        };

        for (index, statement) in setup.iter().enumerate() {
            db.execute_batch(statement)
                .map_err(|err| Error::Setup { index, err })?;
            tracing::debug!(%index, ?statement, "ran program setup statement");
        }

        // Prepare through the statement cache: the compiled statement is
        // returned to the cache when dropped, and is re-used by every invocation.
        let query = query.trim();
        let (input_index, outputs) = {
            let stmt = db.prepare_cached(query).map_err(|err| Error::Compile {
                query: query.to_string(),
                err,
            })?;
            inspect(&stmt)?
        };
        tracing::debug!(?query, ?input_index, ?outputs, "compiled program");

        Ok(Self {
            query: query.to_string(),
            db,
            input_index,
            outputs,
        })
    }

    /// Invoke the program over a `batch` of documents, returning its output
    /// documents. The number of outputs is unrelated to the number of inputs.
    pub fn invoke(&self, batch: &[Value]) -> Result<Vec<Value>, Error> {
        let Self {
            db,
            query,
            input_index,
            outputs,
        } = self;

        let mut stmt = db.prepare_cached(query).map_err(Error::ScriptExecution)?;

        if let Some(index) = *input_index {
            let input = serde_json::to_string(batch)?;
            stmt.raw_bind_parameter(index, input)
                .map_err(Error::ScriptExecution)?;
        }

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();

        while let Some(row) = rows.next().map_err(Error::ScriptExecution)? {
            out.push(row_to_json(outputs.as_deref(), row).map_err(Error::ScriptExecution)?);
        }
        Ok(out)
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

// Validate the parameters of `stmt` and extract its output mapping.
fn inspect(stmt: &rusqlite::Statement<'_>) -> Result<(Option<usize>, Option<Vec<String>>), Error> {
    let mut input_index = None;

    for index in 1..=stmt.parameter_count() {
        match stmt.parameter_name(index) {
            Some(INPUT_PARAM) => input_index = Some(index),
            name => {
                return Err(Error::UnknownParameter {
                    name: name.unwrap_or("?").to_string(),
                })
            }
        }
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let outputs = match names.as_slice() {
        // SELECT json_object(...) FROM ...
        [single] if single.to_ascii_lowercase().starts_with("json") => None,
        // SELECT 1 AS foo, 'two' AS bar FROM ...
        _ => Some(names),
    };

    Ok((input_index, outputs))
}

fn row_to_json(outputs: Option<&[String]>, row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
    let Some(columns) = outputs else {
        return Ok(value_ref_to_json(row.get_ref(0)?));
    };

    columns
        .iter()
        .enumerate()
        .map(|(index, name)| Ok((name.clone(), value_ref_to_json(row.get_ref(index)?))))
        .collect::<rusqlite::Result<serde_json::Map<_, _>>>()
        .map(Value::Object)
}
