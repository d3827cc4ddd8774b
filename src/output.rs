//! JSON conversion for values and query results.
//!
//! Going out, dates become RFC 3339 strings, durations ISO-8601 spans and
//! links their `[[path|display]]` markdown. Coming in, strings that look
//! like links or dates are read back as those types.
//!
//! # Examples
//!
//! ```
//! use quarry::Value;
//! use quarry::output::{to_json, value_from_json};
//!
//! let value = value_from_json(serde_json::json!({"due": "2021-04-18", "up": "[[Home]]"}));
//! let object = value.as_object().unwrap();
//! assert_eq!(object["due"].type_name(), "date");
//! assert_eq!(object["up"].type_name(), "link");
//!
//! assert_eq!(to_json(&Value::Number(42.0)), "42");
//! assert_eq!(to_json(&Value::Number(0.5)), "0.5");
//! ```

use serde_json::{Map, Number, json};

use crate::{
    engine::{CalendarResult, Grouping, ListResult, QueryResult, TableResult, TaskResult},
    settings::QuerySettings,
    temporal,
    value::{Link, Value, Widget},
};

/// Largest magnitude below which every whole `f64` is exactly an `i64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Converts a value to JSON. Whole numbers are written without a fraction.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => json!(*n as i64),
        Value::Number(n) => Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(date) => serde_json::Value::String(date.to_rfc3339()),
        Value::Duration(dur) => serde_json::Value::String(dur.to_iso()),
        Value::Link(link) => serde_json::Value::String(link.markdown()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::Widget(Widget::ListPair { key, value }) => {
            json!({ "key": value_to_json(key), "value": value_to_json(value) })
        }
        Value::Widget(Widget::ExternalLink { url, display }) => {
            json!({ "url": url, "display": display })
        }
    }
}

/// `YYYY-MM-DD` prefix check, so plain text is never mistaken for a date.
fn looks_like_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

fn infer_string(s: String) -> Value {
    let (inner, embed) = match s.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (s.as_str(), false),
    };
    if let Some(body) = inner.strip_prefix("[[").and_then(|rest| rest.strip_suffix("]]"))
        && !body.trim().is_empty()
        && !body.contains("]]")
    {
        return Value::Link(Link::parse_inner(body).to_embed(embed));
    }

    if looks_like_date(&s)
        && let Some(date) = temporal::parse_date_literal(&s)
    {
        return Value::Date(date);
    }
    Value::String(s)
}

/// Converts JSON to a value, recognizing link and date strings.
pub fn value_from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
        serde_json::Value::String(s) => infer_string(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(value_from_json).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, value_from_json(v)))
                .collect(),
        ),
    }
}

/// Compact JSON text.
pub fn to_json(value: &Value) -> String {
    value_to_json(value).to_string()
}

/// JSON text with two-space indentation.
pub fn to_json_pretty(value: &Value) -> String {
    format!("{:#}", value_to_json(value))
}

fn grouping_to_json(grouping: &Grouping) -> serde_json::Value {
    match grouping {
        Grouping::Items(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Grouping::Groups(groups) => serde_json::Value::Array(
            groups
                .iter()
                .map(|group| {
                    json!({
                        "key": value_to_json(&group.key),
                        "rows": grouping_to_json(&group.rows),
                    })
                })
                .collect(),
        ),
    }
}

fn with_count(
    mut object: Map<String, serde_json::Value>,
    count: usize,
    settings: &QuerySettings,
) -> serde_json::Value {
    if settings.display_result_count {
        object.insert("count".to_string(), json!(count));
    }
    serde_json::Value::Object(object)
}

fn table_to_json(table: &TableResult, settings: &QuerySettings) -> serde_json::Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("table"));
    object.insert("headers".to_string(), json!(table.headers));
    object.insert(
        "values".to_string(),
        serde_json::Value::Array(
            table
                .values
                .iter()
                .map(|row| serde_json::Value::Array(row.iter().map(value_to_json).collect()))
                .collect(),
        ),
    );
    with_count(object, table.values.len(), settings)
}

fn list_to_json(list: &ListResult, settings: &QuerySettings) -> serde_json::Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("list"));
    object.insert(
        "values".to_string(),
        serde_json::Value::Array(list.values.iter().map(value_to_json).collect()),
    );
    with_count(object, list.values.len(), settings)
}

fn task_to_json(task: &TaskResult, settings: &QuerySettings) -> serde_json::Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("task"));
    object.insert("tasks".to_string(), grouping_to_json(&task.tasks));
    with_count(object, task.tasks.count(), settings)
}

fn calendar_to_json(calendar: &CalendarResult, settings: &QuerySettings) -> serde_json::Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("calendar"));
    object.insert(
        "entries".to_string(),
        serde_json::Value::Array(
            calendar
                .entries
                .iter()
                .map(|entry| {
                    json!({
                        "date": entry.date.to_rfc3339(),
                        "link": value_to_json(&entry.link),
                        "value": value_to_json(&entry.value),
                    })
                })
                .collect(),
        ),
    );
    with_count(object, calendar.entries.len(), settings)
}

/// Converts a query result to JSON, tagged with its `type`.
pub fn result_to_json(result: &QueryResult, settings: &QuerySettings) -> serde_json::Value {
    match result {
        QueryResult::Table(table) => table_to_json(table, settings),
        QueryResult::List(list) => list_to_json(list, settings),
        QueryResult::Task(task) => task_to_json(task, settings),
        QueryResult::Calendar(calendar) => calendar_to_json(calendar, settings),
    }
}
