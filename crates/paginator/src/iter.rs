use super::{BatchCursor, Error};
use futures::{StreamExt, TryStreamExt};
use row_source::{Row, RowStream, Statement};

/// Step is a single result of a [`RowIterator`].
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub value: Option<Row>,
    pub done: bool,
}

/// RowIterator is a pull-based iterator over the rows of a streamed statement.
///
/// When the underlying stream ends it yields a single terminal step having
/// no value, after which every step is `done`.
pub struct RowIterator {
    stream: Option<RowStream>,
}

impl RowIterator {
    pub fn new(stream: RowStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub async fn next(&mut self) -> Result<Step, Error> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Step {
                value: None,
                done: true,
            });
        };

        match stream.next().await {
            Some(Ok(row)) => Ok(Step {
                value: Some(row),
                done: false,
            }),
            Some(Err(err)) => {
                self.stream = None;
                Err(err.into())
            }
            None => {
                self.stream = None;
                Ok(Step {
                    value: None,
                    done: false,
                })
            }
        }
    }
}

/// WindowIterator walks a streamed statement one `[start, end)` window at a time.
pub struct WindowIterator {
    statement: Box<dyn Statement>,
    cursor: Option<BatchCursor>,
    started: bool,
}

impl WindowIterator {
    /// Count the rows of `statement` and begin iterating over windows of
    /// `window` rows. Returns None if the statement has no rows, in which
    /// case no row stream is ever opened.
    pub async fn open(statement: Box<dyn Statement>, window: u64) -> Result<Option<Self>, Error> {
        let total_rows = statement.total_row_count().await?;
        tracing::debug!(%total_rows, %window, "counted statement rows");

        Ok(BatchCursor::new(total_rows, window).map(|cursor| Self {
            statement,
            cursor: Some(cursor),
            started: false,
        }))
    }

    /// Read the rows of the next window, or None if all windows have been read.
    pub async fn next_window(&mut self) -> Result<Option<Vec<Row>>, Error> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        if self.started && !cursor.advance() {
            self.cursor = None;
            return Ok(None);
        }
        self.started = true;
        let range = cursor.range();

        let rows: Vec<Row> = match self.statement.stream_rows(Some(range.clone())).try_collect().await {
            Ok(rows) => rows,
            Err(err) => {
                self.cursor = None;
                return Err(err.into());
            }
        };

        // The source may have shrunk since it was counted.
        if rows.is_empty() {
            tracing::debug!(?range, "window is empty; treating statement as exhausted");
            self.cursor = None;
            return Ok(None);
        }
        Ok(Some(rows))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn row(id: i64) -> Row {
        [("id".to_string(), json!(id))].into_iter().collect()
    }

    #[tokio::test]
    async fn test_row_iterator_terminal_step() {
        let stream = futures::stream::iter(vec![Ok(row(1)), Ok(row(2))]).boxed();
        let mut it = RowIterator::new(stream);

        let mut steps = Vec::new();
        for _ in 0..4 {
            steps.push(it.next().await.unwrap());
        }

        assert_eq!(
            steps,
            vec![
                Step { value: Some(row(1)), done: false },
                Step { value: Some(row(2)), done: false },
                Step { value: None, done: false },
                Step { value: None, done: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_row_iterator_stream_error() {
        let stream = futures::stream::iter(vec![
            Ok(row(1)),
            Err(row_source::Error::Stream("connection reset".to_string())),
            Ok(row(2)),
        ])
        .boxed();
        let mut it = RowIterator::new(stream);

        assert_eq!(it.next().await.unwrap().value, Some(row(1)));
        insta::assert_snapshot!(it.next().await.unwrap_err(), @"row stream failed: connection reset");
        // The failed stream is not read further.
        assert!(it.next().await.unwrap().done);
    }
}
