use crate::ast::{Field, Source};

/// A field with the name it is projected or stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedField {
    pub name: String,
    pub field: Field,
}

impl NamedField {
    pub fn new(name: impl Into<String>, field: Field) -> Self {
        NamedField {
            name: name.into(),
            field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: Field,
    pub direction: SortDirection,
}

/// The four query shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    List,
    Table,
    Task,
    Calendar,
}

impl QueryType {
    pub fn name(self) -> &'static str {
        match self {
            QueryType::List => "list",
            QueryType::Table => "table",
            QueryType::Task => "task",
            QueryType::Calendar => "calendar",
        }
    }
}

/// The header clause and its projection.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryHeader {
    /// `LIST [WITHOUT ID] [format]`
    List {
        format: Option<Field>,
        show_id: bool,
    },
    /// `TABLE [WITHOUT ID] field [AS name], ...`
    Table {
        fields: Vec<NamedField>,
        show_id: bool,
    },
    /// `TASK`
    Task,
    /// `CALENDAR field`
    Calendar { field: NamedField },
}

impl QueryHeader {
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryHeader::List { .. } => QueryType::List,
            QueryHeader::Table { .. } => QueryType::Table,
            QueryHeader::Task => QueryType::Task,
            QueryHeader::Calendar { .. } => QueryType::Calendar,
        }
    }
}

/// Pipeline operation.
///
/// Operations run in the order they were written.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    /// Keep rows whose clause is truthy
    ///
    /// # Example
    /// ```text
    /// WHERE completed = true
    /// ```
    Where(Field),

    /// Stable sort, field by field
    ///
    /// # Example
    /// ```text
    /// SORT due DESC, file.name
    /// ```
    Sort(Vec<SortField>),

    /// Keep the first N rows; the amount is evaluated once
    ///
    /// # Example
    /// ```text
    /// LIMIT 5
    /// ```
    Limit(Field),

    /// One row per element of an array field
    ///
    /// # Example
    /// ```text
    /// FLATTEN file.tags AS tag
    /// ```
    Flatten(NamedField),

    /// Group rows by key into `{key, rows}`
    ///
    /// # Example
    /// ```text
    /// GROUP BY status
    /// ```
    Group(NamedField),

    /// Like WHERE; conventionally written after GROUP BY
    Having(Field),
}

impl QueryOperation {
    /// Lower-case operation name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryOperation::Where(_) => "where",
            QueryOperation::Sort(_) => "sort",
            QueryOperation::Limit(_) => "limit",
            QueryOperation::Flatten(_) => "flatten",
            QueryOperation::Group(_) => "group",
            QueryOperation::Having(_) => "having",
        }
    }
}

/// Complete query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub header: QueryHeader,

    /// Combined FROM clauses (`Source::Empty` when there are none)
    pub source: Source,

    /// Pipeline operations in textual order
    pub operations: Vec<QueryOperation>,
}
