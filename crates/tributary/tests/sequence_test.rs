//! Integration tests for the sequential multi-source join input.

use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use tributary::input::{InputRegistry, SequenceInput};
use tributary::{SequenceConfig, Transaction};
use tributary_core::config::ComponentKey;

const RECV_TIMEOUT: Duration = Duration::from_secs(60);

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

fn start_sequence(yaml: &str) -> SequenceInput {
    let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
    let registry = InputRegistry::with_builtins();
    SequenceInput::new(ComponentKey::new("test"), config, &registry).unwrap()
}

async fn recv(input: &mut SequenceInput) -> Option<Transaction> {
    tokio::time::timeout(RECV_TIMEOUT, input.next_transaction())
        .await
        .expect("timed out waiting for transaction")
}

/// Consume the whole stream, acking every transaction, returning rendered
/// single-record batches in arrival order.
async fn consume_all(input: &mut SequenceInput) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(txn) = recv(input).await {
        assert_eq!(txn.records().len(), 1, "expected single-record batches");
        seen.push(txn.records()[0].render());
        txn.commit();
    }
    seen
}

/// Like [`consume_all`] but parses each batch as a JSON value.
async fn consume_all_json(input: &mut SequenceInput) -> Vec<Value> {
    let mut seen = Vec::new();
    while let Some(txn) = recv(input).await {
        assert_eq!(txn.records().len(), 1, "expected single-record batches");
        seen.push(txn.records()[0].value().clone());
        txn.commit();
    }
    seen
}

fn sort_by_id(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by_key(|v| {
        v.get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    });
    values
}

#[tokio::test]
async fn test_sequence_happy() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("f1", "foo\nbar\nbaz"),
            ("f2", "buz\nbev\nbif\n"),
            ("f3", "qux\nquz\nqev"),
        ],
    );

    let yaml = format!(
        r#"
inputs:
  - type: lines
    paths: ["{0}/f1"]
  - type: lines
    paths: ["{0}/f2"]
  - type: lines
    paths: ["{0}/f3"]
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    let seen = consume_all(&mut input).await;
    assert_eq!(
        seen,
        ["foo", "bar", "baz", "buz", "bev", "bif", "qux", "quz", "qev"]
    );

    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_sequence_joins() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("csv1", "id,name,age\naaa,A,20\nbbb,B,21\nccc,B,22\n"),
            ("csv2", "id,hobby\nccc,fencing\naaa,running\naaa,gaming\n"),
            (
                "ndjson1",
                concat!(
                    "{\"id\":\"aaa\",\"stuff\":{\"first\":\"foo\"}}\n",
                    "{\"id\":\"bbb\",\"stuff\":{\"first\":\"bar\"}}\n",
                    "{\"id\":\"aaa\",\"stuff\":{\"second\":\"baz\"}}\n",
                ),
            ),
        ],
    );

    let yaml = format!(
        r#"
inputs:
  - type: csv
    paths: ["{0}/csv1", "{0}/csv2"]
  - type: ndjson
    paths: ["{0}/ndjson1"]
sharded_join:
  id_path: id
  iterations: 1
  type: full-outer
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    // Full-outer emission order is unspecified; compare as a set.
    let seen = sort_by_id(consume_all_json(&mut input).await);
    assert_eq!(
        seen,
        [
            json!({
                "id": "aaa", "name": "A", "age": "20",
                "hobby": ["running", "gaming"],
                "stuff": {"first": "foo", "second": "baz"},
            }),
            json!({"id": "bbb", "name": "B", "age": "21", "stuff": {"first": "bar"}}),
            json!({"id": "ccc", "name": "B", "age": "22", "hobby": "fencing"}),
        ]
    );

    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_sequence_joins_merge_strategies() {
    struct TestCase {
        name: &'static str,
        merge_strategy: &'static str,
        // Emission order under an outer join is exactly the final source's
        // read order: aaa, ccc, aaa.
        result: [Value; 3],
    }

    let cases = [
        TestCase {
            name: "array from final",
            merge_strategy: "array",
            result: [
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": ["running", "gaming"], "stuff": "first"}),
                json!({"id": "ccc", "name": "B", "age": "22",
                       "hobby": "fencing", "stuff": "second"}),
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": ["running", "gaming"], "stuff": ["first", "third"]}),
            ],
        },
        TestCase {
            name: "replace from final",
            merge_strategy: "replace",
            result: [
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": "gaming", "stuff": "first"}),
                json!({"id": "ccc", "name": "B", "age": "22",
                       "hobby": "fencing", "stuff": "second"}),
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": "gaming", "stuff": "third"}),
            ],
        },
        TestCase {
            name: "keep from final",
            merge_strategy: "keep",
            result: [
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": "running", "stuff": "first"}),
                json!({"id": "ccc", "name": "B", "age": "22",
                       "hobby": "fencing", "stuff": "second"}),
                json!({"id": "aaa", "name": "A", "age": "20",
                       "hobby": "running", "stuff": "first"}),
            ],
        },
    ];

    for case in cases {
        let dir = TempDir::new().unwrap();
        write_files(
            dir.path(),
            &[
                ("csv1", "id,name,age\naaa,A,20\nbbb,B,21\nccc,B,22\n"),
                ("csv2", "id,hobby\nccc,fencing\naaa,running\naaa,gaming\n"),
                ("final.csv", "id,stuff\naaa,first\nccc,second\naaa,third\n"),
            ],
        );

        let yaml = format!(
            r#"
inputs:
  - type: csv
    paths: ["{0}/csv1", "{0}/csv2"]
  - type: csv
    paths: ["{0}/final.csv"]
sharded_join:
  id_path: id
  iterations: 1
  type: outer
  merge_strategy: {1}
"#,
            dir.path().display(),
            case.merge_strategy
        );
        let mut input = start_sequence(&yaml);

        let seen = consume_all_json(&mut input).await;
        assert_eq!(seen, case.result, "case: {}", case.name);

        input.close();
        input.wait_for_close(Duration::from_secs(1)).await.unwrap();
    }
}

#[tokio::test]
async fn test_sequence_joins_multiple_passes() {
    let dir = TempDir::new().unwrap();

    let mut csv = String::from("id,bar\n");
    let mut ndjson = String::new();
    let total_rows = 100;
    for i in 0..total_rows {
        csv.push_str(&format!("{i},bar{i}\n"));
        ndjson.push_str(&format!("{{\"id\":\"{i}\",\"foo\":\"foo{i}\"}}\n"));
    }
    for i in 0..total_rows {
        csv.push_str(&format!("{i},baz{i}\n"));
    }
    write_files(dir.path(), &[("two.csv", &csv), ("one.ndjson", &ndjson)]);

    let yaml = format!(
        r#"
inputs:
  - type: csv
    paths: ["{0}/two.csv"]
  - type: ndjson
    paths: ["{0}/one.ndjson"]
sharded_join:
  id_path: id
  iterations: 5
  type: full-outer
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    // Sharding must neither lose nor duplicate keys across passes.
    let mut seen = consume_all_json(&mut input).await;
    assert_eq!(seen.len(), total_rows);
    seen.sort_by_key(|v| {
        v.get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_default()
    });
    for (i, value) in seen.iter().enumerate() {
        assert_eq!(
            value,
            &json!({
                "id": i.to_string(),
                "bar": [format!("bar{i}"), format!("baz{i}")],
                "foo": format!("foo{i}"),
            })
        );
    }

    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_sequence_sad() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[("f1", "foo\nbar\nbaz"), ("f4", "buz\nbev\nbif\n")],
    );

    let yaml = format!(
        r#"
inputs:
  - type: lines
    paths: ["{0}/f1"]
  - type: lines
    paths: ["{0}/f2"]
  - type: lines
    paths: ["{0}/f3"]
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    // Output already produced by earlier sources is not withheld.
    for expected in ["foo", "bar", "baz"] {
        let txn = recv(&mut input).await.expect("closed earlier than expected");
        assert_eq!(txn.records()[0].render(), expected);
        txn.commit();
    }

    // The chain is blocked at the missing f2.
    let blocked = tokio::time::timeout(Duration::from_millis(100), input.next_transaction()).await;
    assert!(blocked.is_err(), "unexpected transaction while blocked");

    // Once the resource appears under the expected name, the chain resumes.
    std::fs::rename(dir.path().join("f4"), dir.path().join("f2")).unwrap();

    for expected in ["buz", "bev", "bif"] {
        let txn = recv(&mut input).await.expect("closed earlier than expected");
        assert_eq!(txn.records()[0].render(), expected);
        txn.commit();
    }

    // f3 never appears; close while the chain is blocked on it.
    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_rejected_transaction_is_redelivered() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &[("f1", "only\n")]);

    let yaml = format!(
        r#"
inputs:
  - type: lines
    paths: ["{0}/f1"]
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    let txn = recv(&mut input).await.unwrap();
    assert_eq!(txn.records()[0].render(), "only");
    txn.reject("not yet");

    // The same record comes back.
    let txn = recv(&mut input).await.expect("expected redelivery");
    assert_eq!(txn.records()[0].render(), "only");
    txn.commit();

    assert!(recv(&mut input).await.is_none());
    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_outer_join_skips_keys_missing_from_final_source() {
    let dir = TempDir::new().unwrap();
    write_files(
        dir.path(),
        &[
            ("early.csv", "id,v\naaa,1\nbbb,2\n"),
            ("final.csv", "id,w\naaa,9\n"),
        ],
    );

    let yaml = format!(
        r#"
inputs:
  - type: csv
    paths: ["{0}/early.csv"]
  - type: csv
    paths: ["{0}/final.csv"]
sharded_join:
  id_path: id
  type: outer
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    // Exactly one transaction per final-source record; bbb never emits.
    let seen = consume_all_json(&mut input).await;
    assert_eq!(seen, [json!({"id": "aaa", "v": "1", "w": "9"})]);

    input.close();
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_missing_join_key_fails_the_run() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &[("bad.csv", "name,age\nA,20\n")]);

    let yaml = format!(
        r#"
inputs:
  - type: csv
    paths: ["{0}/bad.csv"]
sharded_join:
  id_path: id
"#,
        dir.path().display()
    );
    let mut input = start_sequence(&yaml);

    // The driver aborts without emitting; the channel just closes.
    assert!(recv(&mut input).await.is_none());
    input.wait_for_close(Duration::from_secs(1)).await.unwrap();
}
