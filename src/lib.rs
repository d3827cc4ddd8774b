//! Quarry: an embedded query engine for structured documents.
//!
//! Queries read like
//!
//! ```text
//! TABLE file.name, due FROM #project WHERE !completed SORT due LIMIT 5
//! ```
//!
//! and run against any [`Corpus`]. The pieces are usable on their own: the
//! [`Lexer`] and [`Parser`] produce a [`Query`] or [`Field`], an
//! [`EvalContext`] evaluates fields to [`Value`]s through the operator and
//! function tables in a [`Library`], and [`executor`] runs the staged
//! pipeline that [`Engine`] shapes into results.

pub mod ast;
pub mod cli;
pub mod corpus;
pub mod data_array;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod functions;
pub mod lexer;
pub mod library;
pub mod operators;
pub mod output;
pub mod parser;
pub mod settings;
pub mod temporal;
pub mod value;

pub use ast::{BinOp, Field, Query, QueryHeader, QueryOperation, QueryType, Source, Token};
pub use corpus::{Corpus, Document, MemoryCorpus, resolve_source};
pub use data_array::DataArray;
pub use engine::{
    CalendarEntry, CalendarResult, Engine, Grouping, ListResult, QueryError, QueryResult,
    TableResult, TaskGroup, TaskResult, parse_field, parse_query,
};
pub use evaluator::{EvalContext, EvalError, LinkHandler, NoLinks};
pub use executor::{IdentifierMeaning, Pagerow, execute_core, execute_core_extract};
pub use functions::{ArgType, Function, FunctionTable};
pub use lexer::{LexError, Lexer, Position};
pub use library::Library;
pub use operators::OperatorTable;
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser};
pub use settings::QuerySettings;
pub use temporal::Duration;
pub use value::{Link, LiteralType, Object, Value, Widget};
