//! # Quarry Query Language - Abstract Syntax Tree
//!
//! The AST is built once by the [parser](crate::parser) and never mutated
//! afterwards; the same tree is evaluated against many rows.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Field nodes (literals, variables, operators, indexing, calls)
//! - **[operators]** - Binary operators
//! - **[source]** - Document selection (tags, folders, links, boolean combinations)
//! - **[query]** - Query header, operations and the complete query
//!
//! ## Quick Start
//!
//! ```text
//! TABLE file.name AS Name, due
//! FROM #project AND "work"
//! WHERE !completed
//! SORT due ASC
//! LIMIT 10
//! ```
//!
//! ## Core Concepts
//!
//! ### Headers
//!
//! - **TABLE** `fields...` - one column per named field
//! - **LIST** `[format]` - one value per row
//! - **TASK** - task items of matching documents
//! - **CALENDAR** `field` - rows bucketed by a date
//!
//! ### Operations
//!
//! Clauses run strictly in the order they are written:
//!
//! - **WHERE** / **HAVING** - keep rows whose condition is truthy
//! - **SORT** - stable sort by one or more fields
//! - **LIMIT** - keep the first N rows
//! - **GROUP BY** - collapse rows with equal keys into `{key, rows}`
//! - **FLATTEN** - expand an array field into one row per element
//!
//! ### Fields
//!
//! ```text
//! 12 + 8 - 4 / 2
//! file.tags[0]
//! [[Some Page]].status
//! date(2021-04-18) + dur(3 days)
//! lower(list("A", "B"))
//! ```
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod source;
pub mod query;

pub use tokens::Token;
pub use expressions::Field;
pub use operators::BinOp;
pub use source::{LinkDirection, Source, SourceOp};
pub use query::{
    NamedField, Query, QueryHeader, QueryOperation, QueryType, SortDirection, SortField,
};
