//! Run queries and inline expressions against a JSON corpus

use tracing::debug;

use super::CliError;
use crate::{Engine, MemoryCorpus, QuerySettings, output, parse_field, parse_query};

/// Options for the query command
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// The query text
    pub query: String,
    /// JSON array of documents
    pub corpus: Option<String>,
    /// Path of the document the query is written in, bound to `this`
    pub origin: Option<String>,
    pub settings: QuerySettings,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
}

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// A single expression
    pub expression: String,
    /// JSON array of documents; links and `this` resolve against it
    pub corpus: Option<String>,
    pub origin: Option<String>,
    pub settings: QuerySettings,
    pub syntax_only: bool,
}

/// Result of a query or eval command
#[derive(Debug)]
pub enum QueryOutcome {
    /// Syntax validation passed
    SyntaxValid,
    /// Executed successfully with JSON output
    Success(serde_json::Value),
}

fn load_corpus(text: Option<&str>) -> Result<MemoryCorpus, CliError> {
    match text {
        Some(text) => {
            let corpus = MemoryCorpus::from_json(text)?;
            debug!(documents = corpus.len(), "corpus loaded");
            Ok(corpus)
        }
        None => Ok(MemoryCorpus::new()),
    }
}

/// Parse and execute a query
pub fn execute_query(options: &QueryOptions) -> Result<QueryOutcome, CliError> {
    let query = parse_query(&options.query)?;
    if options.syntax_only {
        return Ok(QueryOutcome::SyntaxValid);
    }

    let text = options.corpus.as_deref().ok_or(CliError::NoCorpus)?;
    let corpus = load_corpus(Some(text))?;
    let engine = Engine::new(options.settings.clone());
    let result = engine.execute(&query, &corpus, options.origin.as_deref())?;

    for stage in result.diagnostics() {
        for error in &stage.errors {
            debug!(operation = stage.operation, row = error.index, "{}", error.message);
        }
    }

    Ok(QueryOutcome::Success(output::result_to_json(
        &result,
        engine.settings(),
    )))
}

/// Parse and evaluate a single expression
pub fn execute_eval(options: &EvalOptions) -> Result<QueryOutcome, CliError> {
    let field = parse_field(&options.expression)?;
    if options.syntax_only {
        return Ok(QueryOutcome::SyntaxValid);
    }

    let corpus = load_corpus(options.corpus.as_deref())?;
    let engine = Engine::new(options.settings.clone());
    let value = engine.execute_inline(&field, &corpus, options.origin.as_deref())?;
    Ok(QueryOutcome::Success(output::value_to_json(&value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_corpus() {
        let options = QueryOptions {
            query: "LIST".to_string(),
            ..Default::default()
        };
        assert!(matches!(execute_query(&options), Err(CliError::NoCorpus)));
    }

    #[test]
    fn test_syntax_only_skips_corpus() {
        let options = QueryOptions {
            query: "TABLE a, b FROM #x".to_string(),
            syntax_only: true,
            ..Default::default()
        };
        assert!(matches!(execute_query(&options), Ok(QueryOutcome::SyntaxValid)));
    }

    #[test]
    fn test_eval_without_corpus() {
        let options = EvalOptions {
            expression: "join(list(1, 2), \"-\")".to_string(),
            ..Default::default()
        };
        match execute_eval(&options).unwrap() {
            QueryOutcome::Success(json) => assert_eq!(json, serde_json::json!("1-2")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
