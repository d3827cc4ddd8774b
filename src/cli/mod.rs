//! CLI support for quarry
//!
//! Provides programmatic access to the `quarry` command's functionality so
//! other tools can embed it without shelling out.

mod docs;
mod query;

pub use docs::{DocCategory, get_doc_category, get_docs_overview};
pub use query::{EvalOptions, QueryOptions, QueryOutcome, execute_eval, execute_query};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Query failed: {0}")]
    Query(#[from] crate::QueryError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A query was given but no documents to run it against
    #[error("No corpus provided. Use --corpus or pipe a JSON array of documents to stdin.")]
    NoCorpus,

    #[error("Unknown category: '{0}'\nRun 'quarry docs' to see available categories.")]
    UnknownCategory(String),
}
