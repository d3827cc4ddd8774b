//! Query entry points.
//!
//! [`Engine`] owns the operator and function tables plus settings, and runs
//! parsed queries against a [`Corpus`]. Each query shape layers its own
//! projection over the shared pipeline in [`executor`](crate::executor):
//!
//! ```text
//! FROM ───► rows ───► WHERE / SORT / LIMIT / GROUP / FLATTEN ───► extract ───► shape
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    ast::{Field, Query, QueryHeader, QueryType},
    corpus::{Corpus, resolve_source},
    evaluator::{EvalContext, EvalError},
    executor::{
        CoreExecution, IdentifierMeaning, OperationDiagnostics, Pagerow, execute_core,
        execute_core_extract,
    },
    lexer::Lexer,
    library::Library,
    parser::{ParseError, Parser},
    settings::QuerySettings,
    value::{Object, Value, Widget},
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The FROM clause could not be resolved
    #[error("{0}")]
    Source(String),

    #[error("{0}")]
    Eval(#[from] EvalError),

    /// A pipeline stage failed as a whole
    #[error("{0}")]
    Execution(String),

    #[error("Expected a {expected} query, got a {actual} query")]
    WrongQueryType {
        expected: &'static str,
        actual: &'static str,
    },
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a complete query.
///
/// # Examples
///
/// ```
/// use quarry::{parse_query, QueryType};
///
/// let query = parse_query("TABLE file.name FROM #project WHERE done SORT file.name").unwrap();
/// assert_eq!(query.header.query_type(), QueryType::Table);
/// assert_eq!(query.operations.len(), 2);
/// ```
pub fn parse_query(text: &str) -> Result<Query, ParseError> {
    Parser::new(Lexer::new(text))?.parse_query()
}

/// Parses a single expression, as used for inline evaluation.
pub fn parse_field(text: &str) -> Result<Field, ParseError> {
    Parser::new(Lexer::new(text))?.parse()
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TableResult {
    pub headers: Vec<String>,
    pub values: Vec<Vec<Value>>,
    pub id_meaning: IdentifierMeaning,
    pub diagnostics: Vec<OperationDiagnostics>,
    pub timing: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    pub values: Vec<Value>,
    pub id_meaning: IdentifierMeaning,
    pub diagnostics: Vec<OperationDiagnostics>,
    pub timing: Duration,
}

/// Task items, nested once per GROUP BY.
#[derive(Debug, Clone, PartialEq)]
pub enum Grouping {
    Items(Vec<Value>),
    Groups(Vec<TaskGroup>),
}

impl Grouping {
    /// Number of task items at the leaves.
    pub fn count(&self) -> usize {
        match self {
            Grouping::Items(items) => items.len(),
            Grouping::Groups(groups) => groups.iter().map(|group| group.rows.count()).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    pub key: Value,
    pub rows: Grouping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub tasks: Grouping,
    pub id_meaning: IdentifierMeaning,
    pub diagnostics: Vec<OperationDiagnostics>,
    pub timing: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEntry {
    pub date: chrono::DateTime<chrono::FixedOffset>,
    /// The row's identifier, usually a document link
    pub link: Value,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarResult {
    pub entries: Vec<CalendarEntry>,
    pub id_meaning: IdentifierMeaning,
    pub diagnostics: Vec<OperationDiagnostics>,
    pub timing: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Table(TableResult),
    List(ListResult),
    Task(TaskResult),
    Calendar(CalendarResult),
}

impl QueryResult {
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryResult::Table(_) => QueryType::Table,
            QueryResult::List(_) => QueryType::List,
            QueryResult::Task(_) => QueryType::Task,
            QueryResult::Calendar(_) => QueryType::Calendar,
        }
    }

    pub fn diagnostics(&self) -> &[OperationDiagnostics] {
        match self {
            QueryResult::Table(r) => &r.diagnostics,
            QueryResult::List(r) => &r.diagnostics,
            QueryResult::Task(r) => &r.diagnostics,
            QueryResult::Calendar(r) => &r.diagnostics,
        }
    }

    pub fn timing(&self) -> Duration {
        match self {
            QueryResult::Table(r) => r.timing,
            QueryResult::List(r) => r.timing,
            QueryResult::Task(r) => r.timing,
            QueryResult::Calendar(r) => r.timing,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs queries and inline expressions.
///
/// # Examples
///
/// ```
/// use quarry::{Engine, MemoryCorpus, QueryResult, Value};
///
/// let corpus = MemoryCorpus::from_json(r#"[
///     {"path": "a.md", "fields": {"rating": 3}},
///     {"path": "b.md", "fields": {"rating": 5}}
/// ]"#).unwrap();
///
/// let engine = Engine::default();
/// let result = engine.query("LIST rating WHERE rating > 4", &corpus, None).unwrap();
/// let QueryResult::List(list) = result else { panic!() };
/// assert_eq!(list.values.len(), 1);
/// ```
#[derive(Default)]
pub struct Engine {
    library: Library,
    settings: QuerySettings,
}

impl Engine {
    pub fn new(settings: QuerySettings) -> Self {
        Engine {
            library: Library::default(),
            settings,
        }
    }

    /// An engine with custom operators or functions.
    pub fn with_library(library: Library, settings: QuerySettings) -> Self {
        Engine { library, settings }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// An evaluation context over `corpus`, with `this` bound to the origin
    /// document's fields when it exists.
    pub fn context<'a>(&'a self, corpus: &'a dyn Corpus, origin: Option<&str>) -> EvalContext<'a> {
        let ctx = EvalContext::new(corpus, &self.library, &self.settings);
        match origin.and_then(|path| corpus.page(path)) {
            Some(page) => ctx.with_this(page),
            None => ctx,
        }
    }

    /// Parses and runs a query.
    pub fn query(
        &self,
        text: &str,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<QueryResult, QueryError> {
        let query = parse_query(text)?;
        self.execute(&query, corpus, origin)
    }

    /// Runs a query of any shape.
    pub fn execute(
        &self,
        query: &Query,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<QueryResult, QueryError> {
        Ok(match query.header.query_type() {
            QueryType::Table => QueryResult::Table(self.execute_table(query, corpus, origin)?),
            QueryType::List => QueryResult::List(self.execute_list(query, corpus, origin)?),
            QueryType::Task => QueryResult::Task(self.execute_task(query, corpus, origin)?),
            QueryType::Calendar => {
                QueryResult::Calendar(self.execute_calendar(query, corpus, origin)?)
            }
        })
    }

    #[instrument(level = "trace", skip_all, fields(origin = origin.unwrap_or_default()))]
    pub fn execute_table(
        &self,
        query: &Query,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<TableResult, QueryError> {
        let QueryHeader::Table { fields, show_id } = &query.header else {
            return Err(wrong_type(QueryType::Table, query));
        };

        let ctx = self.context(corpus, origin);
        let rows = resolve_source(&query.source, corpus)?;
        let extract: IndexMap<String, Field> = fields
            .iter()
            .map(|named| (named.name.clone(), named.field.clone()))
            .collect();
        let core = execute_core_extract(rows, &ctx, &query.operations, &extract)?;

        let mut headers = Vec::with_capacity(fields.len() + 1);
        if *show_id {
            headers.push(match &core.id_meaning {
                IdentifierMeaning::Group { name, .. } => name.clone(),
                IdentifierMeaning::Path => self.settings.table_id_column_name.clone(),
            });
        }
        headers.extend(extract.keys().cloned());

        let values = core
            .data
            .iter()
            .map(|row| {
                let mut values = Vec::with_capacity(headers.len());
                if *show_id {
                    values.push(row.id.clone());
                }
                values.extend(
                    extract
                        .keys()
                        .map(|name| row.data.get(name).cloned().unwrap_or(Value::Null)),
                );
                values
            })
            .collect::<Vec<_>>();

        debug!(rows = values.len(), columns = headers.len(), "table built");
        Ok(TableResult {
            headers,
            values,
            id_meaning: core.id_meaning,
            diagnostics: core.diagnostics,
            timing: core.timing,
        })
    }

    #[instrument(level = "trace", skip_all, fields(origin = origin.unwrap_or_default()))]
    pub fn execute_list(
        &self,
        query: &Query,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<ListResult, QueryError> {
        let QueryHeader::List { format, show_id } = &query.header else {
            return Err(wrong_type(QueryType::List, query));
        };

        let ctx = self.context(corpus, origin);
        let rows = resolve_source(&query.source, corpus)?;
        let mut extract = IndexMap::new();
        if let Some(format) = format {
            extract.insert("target".to_string(), format.clone());
        }
        let core = execute_core_extract(rows, &ctx, &query.operations, &extract)?;

        let values = core
            .data
            .into_iter()
            .map(|mut row| match (format.is_some(), *show_id) {
                (true, true) => Value::Widget(Widget::ListPair {
                    key: Box::new(row.id),
                    value: Box::new(row.data.shift_remove("target").unwrap_or(Value::Null)),
                }),
                (true, false) => row.data.shift_remove("target").unwrap_or(Value::Null),
                (false, _) => row.id,
            })
            .collect::<Vec<_>>();

        debug!(rows = values.len(), "list built");
        Ok(ListResult {
            values,
            id_meaning: core.id_meaning,
            diagnostics: core.diagnostics,
            timing: core.timing,
        })
    }

    /// Runs a TASK query. The pipeline sees one row per task item; each
    /// carries the task's fields plus its document's `file` object.
    #[instrument(level = "trace", skip_all, fields(origin = origin.unwrap_or_default()))]
    pub fn execute_task(
        &self,
        query: &Query,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<TaskResult, QueryError> {
        if query.header != QueryHeader::Task {
            return Err(wrong_type(QueryType::Task, query));
        }

        let ctx = self.context(corpus, origin);
        let pages = resolve_source(&query.source, corpus)?;
        let rows = task_rows(pages, corpus);
        let CoreExecution {
            data,
            id_meaning,
            timing,
            diagnostics,
        } = execute_core(rows, &ctx, &query.operations)?;

        let tasks = grouping(data, &id_meaning);
        debug!(tasks = tasks.count(), "tasks built");
        Ok(TaskResult {
            tasks,
            id_meaning,
            diagnostics,
            timing,
        })
    }

    /// Runs a CALENDAR query. Rows whose field is not a date are left out.
    #[instrument(level = "trace", skip_all, fields(origin = origin.unwrap_or_default()))]
    pub fn execute_calendar(
        &self,
        query: &Query,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<CalendarResult, QueryError> {
        let QueryHeader::Calendar { field } = &query.header else {
            return Err(wrong_type(QueryType::Calendar, query));
        };

        let ctx = self.context(corpus, origin);
        let rows = resolve_source(&query.source, corpus)?;
        let mut extract = IndexMap::new();
        extract.insert("target".to_string(), field.field.clone());
        let core = execute_core_extract(rows, &ctx, &query.operations, &extract)?;

        let entries = core
            .data
            .into_iter()
            .filter_map(|row| match row.data.get("target") {
                Some(Value::Date(date)) => Some(CalendarEntry {
                    date: *date,
                    value: Value::Date(*date),
                    link: row.id,
                }),
                _ => None,
            })
            .collect::<Vec<_>>();

        debug!(entries = entries.len(), "calendar built");
        Ok(CalendarResult {
            entries,
            id_meaning: core.id_meaning,
            diagnostics: core.diagnostics,
            timing: core.timing,
        })
    }

    /// Evaluates a single expression with `this` bound to the origin
    /// document.
    ///
    /// ```
    /// use quarry::{parse_field, Engine, MemoryCorpus, Value};
    ///
    /// let corpus = MemoryCorpus::from_json(r#"[{"path": "a.md", "fields": {"size": 4}}]"#).unwrap();
    /// let field = parse_field("this.size * 2").unwrap();
    /// let value = Engine::default().execute_inline(&field, &corpus, Some("a.md")).unwrap();
    /// assert_eq!(value, Value::Number(8.0));
    /// ```
    #[instrument(level = "trace", skip_all, fields(origin = origin.unwrap_or_default()))]
    pub fn execute_inline(
        &self,
        field: &Field,
        corpus: &dyn Corpus,
        origin: Option<&str>,
    ) -> Result<Value, QueryError> {
        let ctx = self.context(corpus, origin);
        Ok(ctx.evaluate(field, None)?)
    }
}

fn wrong_type(expected: QueryType, query: &Query) -> QueryError {
    QueryError::WrongQueryType {
        expected: expected.name(),
        actual: query.header.query_type().name(),
    }
}

fn task_rows(pages: Vec<Pagerow>, corpus: &dyn Corpus) -> Vec<Pagerow> {
    let mut rows = Vec::new();
    for page in pages {
        let Value::Link(link) = &page.id else {
            continue;
        };
        let file = page.data.get("file").cloned().unwrap_or(Value::Null);
        for mut task in corpus.tasks(&link.path) {
            let id = task
                .get("link")
                .cloned()
                .unwrap_or_else(|| page.id.clone());
            task.insert("file".to_string(), file.clone());
            rows.push(Pagerow::new(id, task));
        }
    }
    rows
}

/// Rebuilds the group nesting from group rows' members.
fn grouping(rows: Vec<Pagerow>, meaning: &IdentifierMeaning) -> Grouping {
    match meaning {
        IdentifierMeaning::Group { on, .. } => Grouping::Groups(
            rows.into_iter()
                .map(|row| TaskGroup {
                    key: row.id,
                    rows: grouping(row.members, on),
                })
                .collect(),
        ),
        IdentifierMeaning::Path => Grouping::Items(
            rows.into_iter()
                .map(|row| {
                    let mut task: Object = row.data;
                    task.shift_remove("file");
                    Value::Object(task)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use pretty_assertions::assert_eq;

    fn corpus() -> MemoryCorpus {
        MemoryCorpus::from_json(
            r#"[
                {"path": "a.md", "fields": {"status": "open", "due": "2021-04-18"},
                 "tasks": [{"text": "one", "completed": false, "line": 3},
                           {"text": "two", "completed": true, "line": 4}]},
                {"path": "b.md", "fields": {"status": "done"},
                 "tasks": [{"text": "three", "completed": false, "line": 1}]},
                {"path": "c.md", "fields": {"status": "open"}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_grouped_table_uses_group_name_as_id_header() {
        let engine = Engine::default();
        let result = engine
            .query("TABLE length(rows) AS count GROUP BY status", &corpus(), None)
            .unwrap();
        let QueryResult::Table(table) = result else {
            panic!("expected a table");
        };
        assert_eq!(table.headers, vec!["status", "count"]);
        assert_eq!(
            table.values,
            vec![
                vec![Value::from("done"), Value::Number(1.0)],
                vec![Value::from("open"), Value::Number(2.0)],
            ]
        );
    }

    #[test]
    fn test_list_pairs_id_with_format() {
        let engine = Engine::default();
        let QueryResult::List(list) = engine.query("LIST status", &corpus(), None).unwrap() else {
            panic!("expected a list");
        };
        assert!(matches!(list.values[0], Value::Widget(Widget::ListPair { .. })));

        let QueryResult::List(list) = engine
            .query("LIST WITHOUT ID status", &corpus(), None)
            .unwrap()
        else {
            panic!("expected a list");
        };
        assert_eq!(list.values[1], Value::from("done"));
    }

    #[test]
    fn test_tasks_grouped_by_document() {
        let engine = Engine::default();
        let QueryResult::Task(tasks) = engine
            .query("TASK WHERE !completed GROUP BY file.name", &corpus(), None)
            .unwrap()
        else {
            panic!("expected tasks");
        };
        assert_eq!(tasks.tasks.count(), 2);
        let Grouping::Groups(groups) = &tasks.tasks else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].key, Value::from("a"));
        let Grouping::Items(items) = &groups[0].rows else {
            panic!("expected items");
        };
        assert_eq!(items[0].as_object().unwrap()["text"], Value::from("one"));
        assert!(items[0].as_object().unwrap().get("file").is_none());
    }

    #[test]
    fn test_calendar_skips_non_dates() {
        let engine = Engine::default();
        let QueryResult::Calendar(calendar) =
            engine.query("CALENDAR due", &corpus(), None).unwrap()
        else {
            panic!("expected a calendar");
        };
        assert_eq!(calendar.entries.len(), 1);
    }

    #[test]
    fn test_wrong_query_type() {
        let engine = Engine::default();
        let query = parse_query("LIST").unwrap();
        assert!(matches!(
            engine.execute_table(&query, &corpus(), None),
            Err(QueryError::WrongQueryType { expected: "table", actual: "list" })
        ));
    }

    #[test]
    fn test_inline_without_origin() {
        let engine = Engine::default();
        let field = parse_field("this.status").unwrap();
        assert_eq!(engine.execute_inline(&field, &corpus(), None).unwrap(), Value::Null);
        assert_eq!(
            engine.execute_inline(&field, &corpus(), Some("b")).unwrap(),
            Value::from("done")
        );
    }
}
