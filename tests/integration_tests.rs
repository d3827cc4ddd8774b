// tests/integration_tests.rs
//
// End-to-end queries against an in-memory corpus.

use pretty_assertions::assert_eq;
use quarry::output::result_to_json;
use quarry::{
    Document, Engine, Grouping, Link, MemoryCorpus, QueryError, QueryResult, QuerySettings,
    TableResult, Value, parse_field,
};
use serde_json::json;

fn project_corpus() -> MemoryCorpus {
    // p02, p03, p05, p07, p08 and p10 are completed
    MemoryCorpus::from_documents((1..=10).rev().map(|i| {
        let mut doc = Document::new(format!("projects/p{:02}.md", i));
        doc.tags.push("#project".to_string());
        doc.fields
            .insert("completed".to_string(), json!(matches!(i, 2 | 3 | 5 | 7 | 8 | 10)));
        doc.fields.insert("effort".to_string(), json!(i));
        doc
    }))
}

fn notes_corpus() -> MemoryCorpus {
    MemoryCorpus::from_json(
        r##"[
            {"path": "Home.md", "links": ["alpha", "beta"], "fields": {"owner": "sam"}},
            {"path": "work/alpha.md", "tags": ["#a", "#shared"], "links": ["Home"],
             "fields": {"status": "open", "rating": 4, "due": "2021-05-01"},
             "tasks": [{"text": "draft", "completed": false, "line": 2, "due": "2021-04-20"},
                       {"text": "review", "completed": true, "line": 3}]},
            {"path": "work/beta.md", "tags": ["#b", "#shared"],
             "fields": {"status": "closed", "rating": 2, "parent": "[[Home]]"},
             "tasks": [{"text": "ship", "completed": false, "line": 7}]},
            {"path": "daily/2021-04-18.md", "tags": ["#journal"], "fields": {"status": 7}},
            {"path": "daily/2021-04-19.md", "tags": ["#journal"]}
        ]"##,
    )
    .unwrap()
}

fn table(query: &str, corpus: &MemoryCorpus) -> TableResult {
    match Engine::default().query(query, corpus, None) {
        Ok(QueryResult::Table(table)) => table,
        other => panic!("expected a table for {:?}, got {:?}", query, other),
    }
}

fn list(query: &str, corpus: &MemoryCorpus) -> Vec<Value> {
    match Engine::default().query(query, corpus, None) {
        Ok(QueryResult::List(list)) => list.values,
        other => panic!("expected a list for {:?}, got {:?}", query, other),
    }
}

fn link(path: &str) -> Value {
    Value::Link(Link::file(path))
}

// ============================================================================
// TABLE
// ============================================================================

#[test]
fn test_completed_projects_sorted_and_limited() {
    let corpus = project_corpus();
    let result = table(
        "TABLE file.name FROM #project WHERE completed = true SORT file.name ASC LIMIT 5",
        &corpus,
    );

    assert_eq!(result.headers, vec!["File", "file.name"]);
    let names: Vec<Value> = result.values.iter().map(|row| row[1].clone()).collect();
    assert_eq!(
        names,
        vec![
            Value::from("p02"),
            Value::from("p03"),
            Value::from("p05"),
            Value::from("p07"),
            Value::from("p08"),
        ]
    );
    assert_eq!(result.values[0][0], link("projects/p02.md"));
}

#[test]
fn test_sort_then_limit_differs_from_limit_then_sort() {
    let corpus = project_corpus();
    let sorted_first = table("TABLE WITHOUT ID effort SORT effort DESC LIMIT 2", &corpus);
    assert_eq!(
        sorted_first.values,
        vec![vec![Value::Number(10.0)], vec![Value::Number(9.0)]]
    );

    let limited_first = table("TABLE WITHOUT ID effort LIMIT 2 SORT effort DESC", &corpus);
    assert_eq!(
        limited_first.values,
        vec![vec![Value::Number(2.0)], vec![Value::Number(1.0)]]
    );
}

#[test]
fn test_custom_id_column_name() {
    let settings = QuerySettings {
        table_id_column_name: "Note".to_string(),
        ..QuerySettings::default()
    };
    let engine = Engine::new(settings);
    let Ok(QueryResult::Table(result)) = engine.query("TABLE rating", &notes_corpus(), None) else {
        panic!("expected a table");
    };
    assert_eq!(result.headers, vec!["Note", "rating"]);
}

#[test]
fn test_group_by_with_aggregates() {
    let result = table(
        "TABLE sum(rows.rating) AS total, length(rows) AS n FROM #shared or #journal GROUP BY file.folder AS folder",
        &notes_corpus(),
    );
    assert_eq!(result.headers, vec!["folder", "total", "n"]);
    assert_eq!(
        result.values,
        vec![
            vec![Value::from("daily"), Value::Null, Value::Number(2.0)],
            vec![Value::from("work"), Value::Number(6.0), Value::Number(2.0)],
        ]
    );
}

#[test]
fn test_link_fields_resolve_through_corpus() {
    let result = table("TABLE parent.owner FROM #b", &notes_corpus());
    assert_eq!(result.values[0][1], Value::from("sam"));
}

// ============================================================================
// LIST
// ============================================================================

#[test]
fn test_list_ids() {
    assert_eq!(
        list("LIST FROM #shared", &notes_corpus()),
        vec![link("work/alpha.md"), link("work/beta.md")]
    );
}

#[test]
fn test_flatten_tags() {
    assert_eq!(
        list(
            "LIST WITHOUT ID file.name FLATTEN file.etags AS tag WHERE tag = \"#shared\"",
            &notes_corpus()
        ),
        vec![Value::from("alpha"), Value::from("beta")]
    );
}

#[test]
fn test_sources_by_link() {
    let corpus = notes_corpus();
    assert_eq!(list("LIST FROM [[Home]]", &corpus), vec![link("work/alpha.md")]);
    assert_eq!(
        list("LIST FROM outgoing([[Home]]) and -#a", &corpus),
        vec![link("work/beta.md")]
    );
}

#[test]
fn test_this_is_the_origin_document() {
    let corpus = notes_corpus();
    let engine = Engine::default();
    let Ok(QueryResult::List(result)) = engine.query(
        "LIST WHERE contains(this.file.outlinks, file.link)",
        &corpus,
        Some("Home"),
    ) else {
        panic!("expected a list");
    };
    assert_eq!(result.values, vec![link("work/alpha.md"), link("work/beta.md")]);
}

// ============================================================================
// TASK and CALENDAR
// ============================================================================

#[test]
fn test_open_tasks() {
    let engine = Engine::default();
    let Ok(QueryResult::Task(result)) =
        engine.query("TASK FROM #shared WHERE !completed", &notes_corpus(), None)
    else {
        panic!("expected tasks");
    };
    let Grouping::Items(items) = &result.tasks else {
        panic!("expected ungrouped tasks");
    };
    let texts: Vec<Value> = items
        .iter()
        .map(|task| task.as_object().unwrap()["text"].clone())
        .collect();
    assert_eq!(texts, vec![Value::from("draft"), Value::from("ship")]);
}

#[test]
fn test_task_fields_are_typed() {
    let engine = Engine::default();
    let Ok(QueryResult::Task(result)) =
        engine.query("TASK WHERE due AND due < date(2021-05-01)", &notes_corpus(), None)
    else {
        panic!("expected tasks");
    };
    assert_eq!(result.tasks.count(), 1);
}

#[test]
fn test_calendar_by_day() {
    let engine = Engine::default();
    let Ok(QueryResult::Calendar(result)) =
        engine.query("CALENDAR file.day FROM \"daily\"", &notes_corpus(), None)
    else {
        panic!("expected a calendar");
    };
    let days: Vec<String> = result
        .entries
        .iter()
        .map(|entry| entry.date.format("%Y-%m-%d").to_string())
        .collect();
    assert_eq!(days, vec!["2021-04-18", "2021-04-19"]);
    assert_eq!(result.entries[0].link, link("daily/2021-04-18.md"));
}

// ============================================================================
// Errors and Diagnostics
// ============================================================================

#[test]
fn test_failing_rows_are_isolated() {
    let engine = Engine::default();
    let result = engine
        .query("LIST WHERE lower(status) = \"open\"", &notes_corpus(), None)
        .unwrap();

    let QueryResult::List(list) = &result else {
        panic!("expected a list");
    };
    assert_eq!(list.values, vec![link("work/alpha.md")]);

    let stage = &result.diagnostics()[0];
    assert_eq!(stage.operation, "where");
    assert_eq!(stage.incoming_rows, 5);
    assert_eq!(stage.errors.len(), 1);
    assert!(stage.errors[0].message.contains("lower"));
}

#[test]
fn test_every_row_failing_fails_the_query() {
    let engine = Engine::default();
    let err = engine
        .query("LIST FROM #shared WHERE lower(rating)", &notes_corpus(), None)
        .unwrap_err();
    match err {
        QueryError::Execution(message) => {
            assert!(message.contains("Every row during where operation failed"));
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
}

#[test]
fn test_empty_input_never_fails() {
    let engine = Engine::default();
    let result = engine.query("LIST FROM #nothing WHERE lower(rating)", &notes_corpus(), None);
    assert!(result.is_ok());
}

#[test]
fn test_limit_must_be_a_number() {
    let engine = Engine::default();
    let err = engine
        .query("LIST LIMIT \"five\"", &notes_corpus(), None)
        .unwrap_err();
    assert!(matches!(err, QueryError::Execution(_)));
}

#[test]
fn test_missing_link_source() {
    let engine = Engine::default();
    let err = engine
        .query("LIST FROM [[Nowhere]]", &notes_corpus(), None)
        .unwrap_err();
    assert!(matches!(err, QueryError::Source(_)));
    assert!(err.to_string().contains("Nowhere"));
}

#[test]
fn test_parse_errors_carry_positions() {
    let engine = Engine::default();
    let err = engine
        .query("LIST WHERE (a", &notes_corpus(), None)
        .unwrap_err();
    match err {
        QueryError::Parse(parse) => assert_eq!(parse.position.line, 1),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

// ============================================================================
// Inline Evaluation
// ============================================================================

#[test]
fn test_inline_link_lookup() {
    let engine = Engine::default();
    let field = parse_field("[[Home]].owner + \"!\"").unwrap();
    assert_eq!(
        engine.execute_inline(&field, &notes_corpus(), None).unwrap(),
        Value::from("sam!")
    );
}

#[test]
fn test_links_compare_by_resolved_path() {
    let engine = Engine::default();
    let corpus = notes_corpus();
    let eval = |input: &str| {
        let field = parse_field(input).unwrap();
        engine.execute_inline(&field, &corpus, None).unwrap()
    };
    assert_eq!(eval("[[beta]] = [[work/beta.md]]"), Value::Boolean(true));
    assert_eq!(eval("[[work/beta]] = [[beta|The beta note]]"), Value::Boolean(true));
    assert_eq!(eval("[[beta]] != [[work/beta.md]]"), Value::Boolean(false));
    assert_eq!(eval("[[beta]] = [[alpha]]"), Value::Boolean(false));
}

#[test]
fn test_inline_this() {
    let engine = Engine::default();
    let field = parse_field("length(this.file.inlinks)").unwrap();
    assert_eq!(
        engine.execute_inline(&field, &notes_corpus(), Some("Home")).unwrap(),
        Value::Number(1.0)
    );
}

// ============================================================================
// JSON Output
// ============================================================================

#[test]
fn test_table_json() {
    let engine = Engine::default();
    let result = engine
        .query("TABLE WITHOUT ID file.name, due FROM #a", &notes_corpus(), None)
        .unwrap();
    let json = result_to_json(&result, engine.settings());
    assert_eq!(json["type"], json!("table"));
    assert_eq!(json["headers"], json!(["file.name", "due"]));
    assert_eq!(json["values"][0][0], json!("alpha"));
    assert!(json["values"][0][1].as_str().unwrap().starts_with("2021-05-01T00:00:00"));
    assert_eq!(json["count"], json!(1));
}

#[test]
fn test_list_json_without_count() {
    let settings = QuerySettings {
        display_result_count: false,
        ..QuerySettings::default()
    };
    let engine = Engine::new(settings);
    let result = engine.query("LIST FROM #b", &notes_corpus(), None).unwrap();
    let json = result_to_json(&result, engine.settings());
    assert_eq!(json, json!({"type": "list", "values": ["[[work/beta.md]]"]}));
}
