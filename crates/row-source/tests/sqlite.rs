use futures::{StreamExt, TryStreamExt};
use row_source::{Connection, ConnectionConfig, Connector, Error, SqliteConnector};
use serde_json::json;

fn fixture(rows: usize) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let db = rusqlite::Connection::open(file.path()).unwrap();
    db.execute_batch("create table product (id integer primary key, name text not null);")
        .unwrap();

    for id in 1..=rows {
        db.execute(
            "insert into product (id, name) values (?, ?)",
            rusqlite::params![id as i64, format!("product-{id}")],
        )
        .unwrap();
    }
    file
}

async fn connect(file: &tempfile::NamedTempFile) -> Box<dyn Connection> {
    SqliteConnector::new()
        .connect(&ConnectionConfig::new(file.path().to_str().unwrap()))
        .await
        .unwrap()
}

fn ids(rows: &[row_source::Row]) -> Vec<i64> {
    rows.iter().map(|row| row["id"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn test_execute_with_binds() {
    let file = fixture(5);
    let conn = connect(&file).await;

    let rows = conn
        .execute(
            "select id, name from product where id > ? and name != ? order by id",
            &[json!(2), json!("product-4")],
        )
        .await
        .unwrap();

    assert_eq!(ids(&rows), vec![3, 5]);
    assert_eq!(rows[0]["name"], json!("product-3"));

    let count = conn
        .execute("SELECT COUNT(*) AS count FROM product", &[])
        .await
        .unwrap();
    assert_eq!(count, vec![json!({"count": 5}).as_object().unwrap().clone()]);
}

#[tokio::test]
async fn test_streamed_statement_and_windows() {
    let file = fixture(7);
    let conn = connect(&file).await;

    let stmt = conn
        .stream_query("select * from product order by id;", &[])
        .await
        .unwrap();
    assert_eq!(stmt.total_row_count().await.unwrap(), 7);

    let all: Vec<_> = stmt.stream_rows(None).try_collect().await.unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4, 5, 6, 7]);

    // Windows are half-open.
    let window: Vec<_> = stmt.stream_rows(Some(1..3)).try_collect().await.unwrap();
    assert_eq!(ids(&window), vec![2, 3]);

    let tail: Vec<_> = stmt.stream_rows(Some(6..10)).try_collect().await.unwrap();
    assert_eq!(ids(&tail), vec![7]);

    let past: Vec<_> = stmt.stream_rows(Some(7..8)).try_collect().await.unwrap();
    assert!(past.is_empty());
}

#[tokio::test]
async fn test_dropped_stream_stops_producer() {
    let file = fixture(500);
    let conn = SqliteConnector::with_buffer(1)
        .connect(&ConnectionConfig::new(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let stmt = conn
        .stream_query("select * from product order by id", &[])
        .await
        .unwrap();

    let head: Vec<_> = stmt.stream_rows(None).take(3).try_collect().await.unwrap();
    assert_eq!(ids(&head), vec![1, 2, 3]);

    // The primary connection remains usable while (and after) a stream is open.
    let rows = conn.execute("select 1 as one", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_errors() {
    let file = fixture(1);

    let err = SqliteConnector::new()
        .connect(&ConnectionConfig::new("/this/path/does/not/exist.db"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Connection(_)), "{err:?}");

    let conn = connect(&file).await;

    let err = conn.execute("select * from missing", &[]).await.unwrap_err();
    assert!(matches!(&err, Error::Query { sql, .. } if sql == "select * from missing"));

    let err = conn.stream_query("selec nonsense", &[]).await.err().unwrap();
    assert!(matches!(err, Error::Query { .. }), "{err:?}");

    let stmt = conn.stream_query("select * from product", &[]).await.unwrap();

    conn.destroy().await.unwrap();
    assert_eq!(
        conn.destroy().await.unwrap_err(),
        Error::Connection("connection is already closed".to_string())
    );
    assert!(matches!(
        conn.execute("select 1", &[]).await,
        Err(Error::Connection(_))
    ));

    let rows: Vec<_> = stmt.stream_rows(None).collect().await;
    assert!(matches!(rows.as_slice(), [Err(Error::Stream(_))]));
}
