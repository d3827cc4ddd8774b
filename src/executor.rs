//! The staged query pipeline.
//!
//! Rows flow through the operations in textual order. Each stage evaluates
//! its field once per row; a row that fails is dropped and its error is
//! recorded, and a stage only fails as a whole when every row of a
//! non-empty input failed.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::{
    ast::{BinOp, Field, NamedField, QueryOperation, SortDirection, SortField},
    data_array::DataArray,
    engine::QueryError,
    evaluator::{EvalContext, EvalError},
    value::{Object, Value},
};

/// Number of row errors quoted when a whole stage fails.
const QUOTED_ERRORS: usize = 3;

/// A row: an identifier (a document link, or a group key) and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagerow {
    pub id: Value,
    pub data: Object,
    /// The rows a group row was built from, kept so FLATTEN can undo GROUP BY
    pub(crate) members: Vec<Pagerow>,
}

impl Pagerow {
    pub fn new(id: impl Into<Value>, data: Object) -> Self {
        Pagerow {
            id: id.into(),
            data,
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[Pagerow] {
        &self.members
    }
}

/// What a row's `id` currently means.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierMeaning {
    /// The path of the document the row came from
    Path,
    /// The key of a GROUP BY named `name`; `on` is what the grouped rows'
    /// ids meant
    Group {
        name: String,
        on: Box<IdentifierMeaning>,
    },
}

impl IdentifierMeaning {
    pub fn is_grouped(&self) -> bool {
        matches!(self, IdentifierMeaning::Group { .. })
    }
}

/// An error raised while evaluating one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// Position of the row in the stage's input
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDiagnostics {
    pub operation: &'static str,
    pub timing: Duration,
    pub incoming_rows: usize,
    pub outgoing_rows: usize,
    pub errors: Vec<RowError>,
}

/// Rows left after the pipeline, plus per-stage diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreExecution {
    pub data: Vec<Pagerow>,
    pub id_meaning: IdentifierMeaning,
    pub timing: Duration,
    pub diagnostics: Vec<OperationDiagnostics>,
}

fn row_error(index: usize, err: EvalError) -> RowError {
    RowError {
        index,
        message: err.to_string(),
    }
}

/// Fails when every row of a non-empty input errored.
fn check_stage(kind: &str, incoming: usize, errors: &[RowError]) -> Result<(), QueryError> {
    if incoming == 0 || errors.len() != incoming {
        return Ok(());
    }

    let quoted: Vec<String> = errors
        .iter()
        .take(QUOTED_ERRORS)
        .map(|e| format!("{}: {}", e.index, e.message))
        .collect();
    warn!(operation = kind, rows = incoming, "every row failed");
    Err(QueryError::Execution(format!(
        "Every row during {} operation failed with an error; first {}:\n{}",
        kind,
        quoted.len(),
        quoted.join("\n")
    )))
}

fn filter(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    clause: &Field,
    errors: &mut Vec<RowError>,
) -> Vec<Pagerow> {
    let mut kept = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match ctx.evaluate(clause, Some(&row.data)) {
            Ok(value) if value.is_truthy() => kept.push(row),
            Ok(_) => {}
            Err(err) => errors.push(row_error(index, err)),
        }
    }
    kept
}

/// Orders two evaluated sort keys with the `<` and `>` operators.
fn compare_keys(ctx: &EvalContext<'_>, fields: &[SortField], a: &[Value], b: &[Value]) -> Ordering {
    for ((field, left), right) in fields.iter().zip(a).zip(b) {
        let holds = |op| {
            ctx.evaluate_binary(left, op, right)
                .map(|v| v.is_truthy())
                .unwrap_or(false)
        };
        let ordering = if holds(BinOp::LessThan) {
            Ordering::Less
        } else if holds(BinOp::GreaterThan) {
            Ordering::Greater
        } else {
            Ordering::Equal
        };
        let ordering = match field.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn sort(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    fields: &[SortField],
    errors: &mut Vec<RowError>,
) -> Vec<Pagerow> {
    let mut keyed = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let keys: Result<Vec<Value>, EvalError> = fields
            .iter()
            .map(|sort| ctx.evaluate(&sort.field, Some(&row.data)))
            .collect();
        match keys {
            Ok(keys) => keyed.push((keys, row)),
            Err(err) => errors.push(row_error(index, err)),
        }
    }

    DataArray::new(keyed)
        .sort_by(|(a, _), (b, _)| compare_keys(ctx, fields, a, b))
        .map(|(_, row)| row)
        .into_vec()
}

fn limit(rows: Vec<Pagerow>, ctx: &EvalContext<'_>, amount: &Field) -> Result<Vec<Pagerow>, QueryError> {
    let value = ctx
        .evaluate(amount, None)
        .map_err(|e| QueryError::Execution(format!("Failed to evaluate LIMIT: {}", e)))?;
    match value {
        Value::Number(n) if n >= 0.0 && n.is_finite() => {
            Ok(DataArray::new(rows).limit(n.trunc() as usize).into_vec())
        }
        other => Err(QueryError::Execution(format!(
            "LIMIT must be a non-negative number, got {} ({})",
            other,
            other.type_name()
        ))),
    }
}

fn group(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    by: &NamedField,
    errors: &mut Vec<RowError>,
) -> Vec<Pagerow> {
    let mut keyed = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match ctx.evaluate(&by.field, Some(&row.data)) {
            Ok(key) => keyed.push((key, row)),
            Err(err) => errors.push(row_error(index, err)),
        }
    }

    DataArray::new(keyed)
        .group_by(|(key, _)| key.clone(), |a, b| ctx.compare(a, b))
        .into_iter()
        .map(|group| {
            let members: Vec<Pagerow> = group.rows.map(|(_, row)| row).into_vec();
            let mut data = Object::new();
            data.insert(by.name.clone(), group.key.clone());
            data.insert("key".to_string(), group.key.clone());
            data.insert(
                "rows".to_string(),
                Value::Array(
                    members
                        .iter()
                        .map(|member| Value::Object(member.data.clone()))
                        .collect(),
                ),
            );
            Pagerow {
                id: group.key,
                data,
                members,
            }
        })
        .collect()
}

fn flatten(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    target: &NamedField,
    errors: &mut Vec<RowError>,
) -> Vec<Pagerow> {
    let indexed: DataArray<(usize, Pagerow)> = rows.into_iter().enumerate().collect();
    indexed
        .flat_map(|(index, row)| match ctx.evaluate(&target.field, Some(&row.data)) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    let mut copy = row.clone();
                    copy.data.insert(target.name.clone(), item);
                    copy
                })
                .collect(),
            Ok(value) => {
                let mut copy = row;
                copy.data.insert(target.name.clone(), value);
                vec![copy]
            }
            Err(err) => {
                errors.push(row_error(index, err));
                Vec::new()
            }
        })
        .into_vec()
}

/// Restores the member rows of every group, putting the key back under
/// the group's name.
fn ungroup(rows: Vec<Pagerow>, name: &str) -> Vec<Pagerow> {
    DataArray::new(rows)
        .flat_map(|row| {
            let key = row.id;
            row.members.into_iter().map(move |mut member| {
                member.data.insert(name.to_string(), key.clone());
                member
            })
        })
        .into_vec()
}

/// Runs the operations over the rows in order.
#[instrument(level = "trace", skip_all, fields(rows = rows.len(), operations = operations.len()))]
pub fn execute_core(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    operations: &[QueryOperation],
) -> Result<CoreExecution, QueryError> {
    let start = Instant::now();
    let mut rows = rows;
    let mut id_meaning = IdentifierMeaning::Path;
    let mut diagnostics = Vec::with_capacity(operations.len());

    for operation in operations {
        let stage_start = Instant::now();
        let incoming = rows.len();
        let mut errors = Vec::new();

        rows = match operation {
            QueryOperation::Where(clause) | QueryOperation::Having(clause) => {
                filter(rows, ctx, clause, &mut errors)
            }
            QueryOperation::Sort(fields) => sort(rows, ctx, fields, &mut errors),
            QueryOperation::Limit(amount) => limit(rows, ctx, amount)?,
            QueryOperation::Group(by) => {
                let grouped = group(rows, ctx, by, &mut errors);
                id_meaning = IdentifierMeaning::Group {
                    name: by.name.clone(),
                    on: Box::new(id_meaning),
                };
                grouped
            }
            QueryOperation::Flatten(target) => match id_meaning {
                IdentifierMeaning::Group { name, on } if name == target.name => {
                    id_meaning = *on;
                    ungroup(rows, &name)
                }
                meaning => {
                    id_meaning = meaning;
                    flatten(rows, ctx, target, &mut errors)
                }
            },
        };

        check_stage(operation.kind(), incoming, &errors)?;
        debug!(
            operation = operation.kind(),
            incoming,
            outgoing = rows.len(),
            errors = errors.len(),
            "stage complete"
        );

        diagnostics.push(OperationDiagnostics {
            operation: operation.kind(),
            timing: stage_start.elapsed(),
            incoming_rows: incoming,
            outgoing_rows: rows.len(),
            errors,
        });
    }

    Ok(CoreExecution {
        data: rows,
        id_meaning,
        timing: start.elapsed(),
        diagnostics,
    })
}

/// Runs the pipeline, then replaces each row's data with the named fields
/// evaluated against it.
pub fn execute_core_extract(
    rows: Vec<Pagerow>,
    ctx: &EvalContext<'_>,
    operations: &[QueryOperation],
    fields: &IndexMap<String, Field>,
) -> Result<CoreExecution, QueryError> {
    let mut core = execute_core(rows, ctx, operations)?;
    let stage_start = Instant::now();
    let incoming = core.data.len();
    let mut errors = Vec::new();
    let mut extracted = Vec::with_capacity(incoming);

    'rows: for (index, row) in std::mem::take(&mut core.data).into_iter().enumerate() {
        let mut data = Object::new();
        for (name, field) in fields {
            match ctx.evaluate(field, Some(&row.data)) {
                Ok(value) => {
                    data.insert(name.clone(), value);
                }
                Err(err) => {
                    errors.push(row_error(index, err));
                    continue 'rows;
                }
            }
        }
        extracted.push(Pagerow {
            id: row.id,
            data,
            members: row.members,
        });
    }

    check_stage("extract", incoming, &errors)?;
    core.diagnostics.push(OperationDiagnostics {
        operation: "extract",
        timing: stage_start.elapsed(),
        incoming_rows: incoming,
        outgoing_rows: extracted.len(),
        errors,
    });
    core.data = extracted;
    core.timing += stage_start.elapsed();
    Ok(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NoLinks;
    use crate::library::Library;
    use crate::settings::QuerySettings;
    use crate::{parse_field, parse_query};

    fn row(name: &str, status: &str) -> Pagerow {
        let mut data = Object::new();
        data.insert("name".to_string(), Value::from(name));
        data.insert("status".to_string(), Value::from(status));
        Pagerow::new(Value::from(name), data)
    }

    fn run(query: &str, rows: Vec<Pagerow>) -> Result<CoreExecution, QueryError> {
        let library = Library::default();
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);
        let query = parse_query(query).unwrap();
        execute_core(rows, &ctx, &query.operations)
    }

    #[test]
    fn test_group_then_flatten_round_trips() {
        let rows = vec![row("a", "open"), row("b", "done"), row("c", "open")];
        let grouped = run("LIST GROUP BY status", rows.clone()).unwrap();
        assert_eq!(grouped.data.len(), 2);
        assert!(grouped.id_meaning.is_grouped());

        let restored = run("LIST GROUP BY status FLATTEN status", rows.clone()).unwrap();
        assert_eq!(restored.id_meaning, IdentifierMeaning::Path);
        let mut ids: Vec<String> = restored.data.iter().map(|r| r.id.to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(restored.data.iter().all(|r| r.data.get("status").is_some_and(|s| !s.is_array())));
    }

    #[test]
    fn test_all_rows_failing_fails_the_stage() {
        let rows = vec![row("a", "open"), row("b", "done")];
        let err = run("LIST WHERE status - 1", rows).unwrap_err();
        match err {
            QueryError::Execution(message) => {
                assert!(message.starts_with("Every row during where operation failed"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_partial_failures_are_isolated() {
        let mut odd = row("x", "open");
        odd.data.insert("n".to_string(), Value::from("text"));
        let mut good = row("y", "open");
        good.data.insert("n".to_string(), Value::Number(2.0));

        let result = run("LIST WHERE n > 1 - 0 and n - 1 > 0", vec![odd, good]).unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.diagnostics[0].errors.len(), 1);
        assert_eq!(result.diagnostics[0].errors[0].index, 0);
    }

    #[test]
    fn test_limit_must_be_numeric() {
        let rows = vec![row("a", "open")];
        assert!(run("LIST LIMIT \"two\"", rows.clone()).is_err());
        assert_eq!(run("LIST LIMIT 0", rows).unwrap().data.len(), 0);
    }

    #[test]
    fn test_sort_descending_is_stable() {
        let rows = vec![row("a", "1"), row("b", "2"), row("c", "1")];
        let result = run("LIST SORT status DESC", rows).unwrap();
        let ids: Vec<String> = result.data.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_extract_projects_named_fields() {
        let library = Library::default();
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);
        let mut fields = IndexMap::new();
        fields.insert("upper".to_string(), parse_field("upper(name)").unwrap());

        let result = execute_core_extract(vec![row("a", "open")], &ctx, &[], &fields).unwrap();
        assert_eq!(result.data[0].data.get("upper"), Some(&Value::from("A")));
        assert_eq!(result.diagnostics.last().map(|d| d.operation), Some("extract"));
    }
}
