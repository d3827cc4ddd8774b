use std::fs;
use std::io::{self, Read};

use clap::{Parser as ClapParser, Subcommand};
use quarry::QuerySettings;
use quarry::cli::{self, CliError, EvalOptions, QueryOptions, QueryOutcome};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ClapParser)]
#[command(name = "quarry")]
#[command(about = "Quarry - run TABLE, LIST, TASK and CALENDAR queries over JSON documents")]
#[command(version)]
struct Cli {
    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against a corpus of documents
    Query {
        /// The query text
        query: String,

        /// JSON file holding an array of documents (reads stdin if not provided)
        #[arg(short, long)]
        corpus: Option<String>,

        /// Path of the document the query runs in, bound to `this`
        #[arg(short, long)]
        origin: Option<String>,

        /// JSON file with rendering settings
        #[arg(short, long)]
        settings: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// Evaluate a single expression
    Eval {
        /// The expression
        expression: String,

        /// JSON file holding an array of documents
        #[arg(short, long)]
        corpus: Option<String>,

        /// Path of the document bound to `this`
        #[arg(short, long)]
        origin: Option<String>,

        /// JSON file with rendering settings
        #[arg(short, long)]
        settings: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// List documentation categories
    Docs,

    /// Show documentation for a specific category
    Doc {
        /// Category name (use 'quarry docs' to list categories)
        category: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "quarry=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Query {
            query,
            corpus,
            origin,
            settings,
            pretty,
            syntax_only,
        } => run_query(query, corpus, origin, settings, pretty, syntax_only),
        Commands::Eval {
            expression,
            corpus,
            origin,
            settings,
            pretty,
            syntax_only,
        } => run_eval(expression, corpus, origin, settings, pretty, syntax_only),
        Commands::Docs => {
            print!("{}", cli::get_docs_overview());
            Ok(())
        }
        Commands::Doc { category } => cli::get_doc_category(&category).map(|content| {
            print!("{}", content);
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn load_settings(path: Option<String>) -> Result<QuerySettings, CliError> {
    match path {
        Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => Ok(QuerySettings::default()),
    }
}

/// The corpus file, or stdin when something is piped in.
fn read_corpus(path: Option<String>) -> Result<Option<String>, CliError> {
    match path {
        Some(path) => Ok(Some(fs::read_to_string(path)?)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}

fn print_outcome(outcome: QueryOutcome, pretty: bool) -> Result<(), CliError> {
    match outcome {
        QueryOutcome::SyntaxValid => println!("Syntax is valid"),
        QueryOutcome::Success(output) => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

fn run_query(
    query: String,
    corpus: Option<String>,
    origin: Option<String>,
    settings: Option<String>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let options = QueryOptions {
        query,
        corpus: if syntax_only { None } else { read_corpus(corpus)? },
        origin,
        settings: load_settings(settings)?,
        syntax_only,
    };
    print_outcome(cli::execute_query(&options)?, pretty)
}

fn run_eval(
    expression: String,
    corpus: Option<String>,
    origin: Option<String>,
    settings: Option<String>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let options = EvalOptions {
        expression,
        corpus: if syntax_only { None } else { read_corpus(corpus)? },
        origin,
        settings: load_settings(settings)?,
        syntax_only,
    };
    print_outcome(cli::execute_eval(&options)?, pretty)
}
