use batch_lambda::Program;
use serde_json::{json, Value};

#[test]
fn test_setup_state_persists_across_batches() {
    let program = Program::compile(
        r#"
        create table totals (name text primary key, n integer not null);

        insert into totals (name, n)
        select json_extract(value, '$.name'), json_extract(value, '$.n')
        from json_each($input) where true
        on conflict (name) do update set n = n + excluded.n
        returning name, n;
        "#,
    )
    .unwrap();

    let mut out = program
        .invoke(&[json!({"name": "a", "n": 1}), json!({"name": "b", "n": 2})])
        .unwrap();
    out.sort_by_key(|doc| doc["name"].as_str().map(String::from));
    assert_eq!(out, vec![json!({"name": "a", "n": 1}), json!({"name": "b", "n": 2})]);

    let out = program.invoke(&[json!({"name": "a", "n": 5})]).unwrap();
    assert_eq!(out, vec![json!({"name": "a", "n": 6})]);

    // Output cardinality is independent of the input.
    let out = program.invoke(&[]).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_script_execution_error_is_distinguished() {
    let program = Program::compile(
        "select json(json_extract(value, '$.payload')) as payload from json_each($input);",
    )
    .unwrap();

    let out = program
        .invoke(&[json!({"payload": r#"{"ok": true}"#})])
        .unwrap();
    assert_eq!(out, vec![json!({"payload": {"ok": true}})]);

    let err = program
        .invoke(&[json!({"payload": "{not json"})])
        .unwrap_err();
    assert!(err.is_script_execution(), "{err:?}");
    assert!(err.to_string().starts_with("script execution error"), "{err}");

    // The program itself remains usable: deciding whether to continue is up to the caller.
    let out: Vec<Value> = program.invoke(&[json!({"payload": "[1]"})]).unwrap();
    assert_eq!(out, vec![json!({"payload": [1]})]);

    let err = Program::compile("select $nope;").err().unwrap();
    assert!(!err.is_script_execution());
}
