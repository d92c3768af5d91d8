//! Command handlers for mnemos CLI.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::debug;

use crate::output::*;
use mnemos::config::Config;
use mnemos::errors::Error;
use mnemos::memory::{Providers, DIALOGUE_DB_FILE};
use mnemos::sqlite::Database;
use mnemos::vector::validate_limit;
use mnemos::{
    validate_user_id, CrossEncoderReranker, EmbeddingEngine, ExcerptSummarizer, MemoryRegistry,
    QueryInput, SummarizeOutcome, SystemClock, UserMemoryClient,
};

/// Commands supported by mnemos CLI.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Store one dialogue turn
    Insert {
        /// Turn text
        text: String,

        /// Speaker role
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    /// Retrieve relevant dialogue turns (or summaries with --summary)
    Query {
        /// Single utterance to search for
        #[arg(required_unless_present_any = ["context", "vector"])]
        text: Option<String>,

        /// Consecutive turns searched as one context
        #[arg(long, num_args = 1.., conflicts_with_all = ["text", "vector"])]
        context: Vec<String>,

        /// Query embedding as a JSON array of floats
        #[arg(long, conflicts_with = "text")]
        vector: Option<String>,

        /// Search the summary collection instead of raw dialogue
        #[arg(long)]
        summary: bool,

        /// Maximum number of results (default: from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Fold unsummarized dialogue into a new summary
    Summarize,
    /// List the most recent dialogue turns
    Recent {
        /// Number of turns (default: 10)
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
    /// List the most recent summaries
    Summaries {
        /// Number of summaries (default: 5)
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Only summaries ending at or before this epoch second
        #[arg(long)]
        before: Option<i64>,
    },
    Version,
}

/// Execute a CLI command for `user_id`.
pub fn execute(
    command: &Commands,
    config: &Config,
    user_id: &str,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        Commands::Insert { text, role } => {
            with_client(config, user_id, |client| handle_insert(client, role, text, json))
        }
        Commands::Query {
            text,
            context,
            vector,
            summary,
            top_k,
        } => {
            let query = parse_query(text.as_deref(), context, vector.as_deref())?;
            let top_k = top_k.unwrap_or(config.default_top_k);
            validate_limit(top_k)?;
            with_client(config, user_id, |client| {
                handle_query(client, query, top_k, *summary, json)
            })
        }
        Commands::Summarize => with_client(config, user_id, |client| handle_summarize(client, json)),
        Commands::Recent { count } => handle_recent(&open_log(config, user_id)?, *count, json),
        Commands::Summaries { count, before } => {
            handle_summaries(&open_log(config, user_id)?, *count, *before, json)
        }
        Commands::Version => handle_version(json),
    }
}

fn parse_query(
    text: Option<&str>,
    context: &[String],
    vector: Option<&str>,
) -> Result<QueryInput, Error> {
    if let Some(raw) = vector {
        let values: Vec<f32> = serde_json::from_str(raw)?;
        return Ok(QueryInput::Vector(values));
    }
    if !context.is_empty() {
        return Ok(QueryInput::Context(context.to_vec()));
    }
    text.map(QueryInput::from)
        .ok_or_else(|| Error::InvalidInput("query text, --context or --vector required".to_string()))
}

/// Build the model-backed providers and run `f` against the user's client.
fn with_client(
    config: &Config,
    user_id: &str,
    f: impl FnOnce(&UserMemoryClient) -> Result<ExitCode, Error>,
) -> Result<ExitCode, Error> {
    validate_user_id(user_id)?;
    debug!(model = %config.embedding_model, "loading embedding model");
    let embedder = EmbeddingEngine::new(&config.embedding_model, &config.model_cache)?
        .with_prefix(config.embedding_prefix.as_str());
    debug!(model = %config.rerank_model, "loading rerank model");
    let reranker = CrossEncoderReranker::new(&config.rerank_model, &config.model_cache)?;

    let providers = Providers {
        embedder: Arc::new(embedder),
        reranker: Arc::new(reranker),
        summarizer: Arc::new(ExcerptSummarizer::new(config.summary_excerpt_chars)),
        clock: Arc::new(SystemClock),
    };
    let registry = MemoryRegistry::new(&config.data_dir, config.client_settings(), providers);

    let client = registry.open(user_id)?;
    let result = f(&client);
    registry.shutdown()?;
    result
}

/// Open only the user's dialogue log; listing needs no models.
fn open_log(config: &Config, user_id: &str) -> Result<Database, Error> {
    validate_user_id(user_id)?;
    let user_dir = config.data_dir.join(user_id);
    std::fs::create_dir_all(&user_dir)?;
    Ok(Database::open(
        &user_dir.join(DIALOGUE_DB_FILE),
        Arc::new(SystemClock),
    )?)
}

fn handle_insert(
    client: &UserMemoryClient,
    role: &str,
    text: &str,
    json: bool,
) -> Result<ExitCode, Error> {
    let outcome = client.insert_record(role, text)?;
    if json {
        print_json(&InsertResponse {
            status: "inserted".to_string(),
            id: outcome.id,
            indexed: outcome.indexed,
        });
    } else {
        println!("Inserted dialogue: {}", outcome.id);
        if !outcome.indexed {
            println!("Warning: stored without embedding; not yet searchable");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_query(
    client: &UserMemoryClient,
    query: QueryInput,
    top_k: usize,
    summary: bool,
    json: bool,
) -> Result<ExitCode, Error> {
    if summary {
        let results = client.query_summary_memory(query, top_k);
        if json {
            print_json(&SummaryQueryResponse { results });
        } else {
            for hit in results {
                println!(
                    "{} [distance: {:.3}] {} .. {}\n  {}\n",
                    hit.id,
                    hit.distance,
                    format_timestamp(hit.start_time),
                    format_timestamp(hit.end_time),
                    hit.summary_text
                );
            }
        }
    } else {
        let results = client.query_raw_memory(query, top_k);
        if json {
            print_json(&RawQueryResponse { results });
        } else {
            for hit in results {
                println!("{} [distance: {:.3}]\n  {}\n", hit.id, hit.distance, hit.text);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_summarize(client: &UserMemoryClient, json: bool) -> Result<ExitCode, Error> {
    let outcome = client.summarize_memory()?;
    if json {
        print_json(&outcome);
    } else {
        match &outcome {
            SummarizeOutcome::UpToDate => println!("Nothing new to summarize"),
            SummarizeOutcome::Summarized { record, indexed } => {
                println!(
                    "Summary {} covers {} .. {}",
                    record.id,
                    format_timestamp(record.start_time),
                    format_timestamp(record.end_time)
                );
                println!("  {}", record.summary_text);
                if !indexed {
                    println!("Warning: summary stored without embedding");
                }
            }
            SummarizeOutcome::Aborted { reason } => println!("Summarization aborted: {}", reason),
        }
    }
    match outcome {
        SummarizeOutcome::Aborted { .. } => Ok(ExitCode::from(2)),
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn handle_recent(db: &Database, count: usize, json: bool) -> Result<ExitCode, Error> {
    let dialogues = db.latest_dialogues(count)?;
    if json {
        print_json(&RecentResponse { dialogues });
    } else {
        for record in dialogues.iter().rev() {
            println!(
                "{} {} [{}]: {}",
                record.id,
                format_timestamp(record.timestamp),
                record.role,
                record.text
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_summaries(
    db: &Database,
    count: usize,
    before: Option<i64>,
    json: bool,
) -> Result<ExitCode, Error> {
    let summaries = db.latest_summaries(before, count)?;
    if json {
        print_json(&SummariesResponse { summaries });
    } else {
        for record in summaries {
            println!(
                "{} {} .. {}\n  {}\n",
                record.id,
                format_timestamp(record.start_time),
                format_timestamp(record.end_time),
                record.summary_text
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn handle_version(json: bool) -> Result<ExitCode, Error> {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": env!("CARGO_PKG_NAME")
        }));
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    Ok(ExitCode::SUCCESS)
}
