//! CLI definition and command dispatch for reporag.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`, `--top-k`, `--pre`, `--post`)
//! 2. Environment variables (`REPORAG_CONFIG`, `REPORAG_VERBOSE`, `REPORAG_INDEX`)
//! 3. Config file (`~/.reporag/config.yaml` or the path from `--config`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use crate::ui::{format, table, ColorMode, MessageType, Style};

use reporag_core::{
    parse_filter_arg, ChatMessage, FilterMetrics, PreFilterDecision, QueryEngine, QueryOptions,
    QueryProcessor, QueryResult, RagConfig, RetrievalStatus,
};
use reporag_db::{load_records, SimpleIndex};
use reporag_model::{create_embedder, create_generator, EmbeddingModel};

// ============================================================================
// CLI Definition
// ============================================================================

/// RepoRAG - question answering over an indexed code repository
#[derive(Parser, Debug)]
#[command(name = "reporag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "REPORAG_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.reporag/config.yaml)
    #[arg(long, global = true, env = "REPORAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "REPORAG_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Index and filter flags shared by `search` and `ask`.
#[derive(Args, Debug)]
pub struct RetrievalArgs {
    /// Chunk index file (JSONL: text, metadata, optional vector)
    #[arg(long, env = "REPORAG_INDEX")]
    pub index: PathBuf,

    /// Number of results (overrides the intent-driven count)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Indexed metadata filter, e.g. language=python or file_type=code,test
    #[arg(long = "pre", value_name = "FILTER")]
    pub pre: Vec<String>,

    /// Post-search filter, e.g. complexity_score<=5 or has_docstring=true
    #[arg(long = "post", value_name = "FILTER")]
    pub post: Vec<String>,

    /// Add neighboring chunks from the same files to the context
    #[arg(long)]
    pub expand: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve and rank chunks without calling the generator
    #[command(after_help = r#"EXAMPLES:
    # Ranked chunks for a question
    reporag search "how does login work" --index chunks.jsonl

    # Only Python code, at most complexity 5
    reporag search "token refresh" --index chunks.jsonl --pre language=python --post complexity_score<=5

    # Machine-readable output with filter metrics
    reporag search "where are sessions stored" --index chunks.jsonl --json | jq '.metrics'
"#)]
    Search {
        /// Natural-language question
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Answer a question with the configured generator
    #[command(after_help = r#"EXAMPLES:
    # Ask a question (requires a generator, e.g. a build with --features ollama)
    reporag ask "how does the parser report errors?" --index chunks.jsonl

    # Follow-up question with conversation context
    reporag ask "and where is it tested?" --index chunks.jsonl --history "how does the parser report errors?"

    # Full result as JSON
    reporag ask "what is a token" --index chunks.jsonl --json
"#)]
    Ask {
        /// Natural-language question
        query: String,

        /// Previous user question, oldest first (repeatable)
        #[arg(long = "history", value_name = "QUESTION")]
        history: Vec<String>,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Show how a question is understood (intent, entities, rewrites)
    #[command(after_help = r#"EXAMPLES:
    reporag analyze "fix the TypeError in parse_config()"
    reporag analyze "explain the db auth flow" --json
"#)]
    Analyze {
        /// Natural-language question
        query: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file and report warnings
    #[command(after_help = r#"EXAMPLES:
    reporag config check
    reporag config check --config ./reporag.yaml --json
"#)]
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Show,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always; debug with --verbose. RUST_LOG takes precedence.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let default_filter = format!(
        "reporag_core={l},reporag_db={l},reporag_model={l},reporag={l}",
        l = log_level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color_mode = cli.color.parse::<ColorMode>().unwrap_or_default();
    let style = Style::new(color_mode);
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Search { query, retrieval } => handle_search(&style, config_path, &query, &retrieval),
        Command::Ask {
            query,
            history,
            retrieval,
        } => handle_ask(&style, config_path, &query, &history, &retrieval),
        Command::Analyze { query, json } => handle_analyze(&style, config_path, &query, json),
        Command::Config { command } => match command {
            ConfigCommand::Check { json } => handle_config_check(&style, config_path, json),
            ConfigCommand::Show => handle_config_show(config_path),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            let cause = e.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>().join(": ");
            let cause = (!cause.is_empty()).then_some(cause);
            eprintln!("{}", style.error_with_context(&e.to_string(), cause.as_deref(), None));
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Setup helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    let config = match path {
        Some(path) => RagConfig::from_path(path),
        None => RagConfig::load_default(),
    };
    config.context("Failed to load configuration")
}

/// Load chunk records and embed those stored without a vector.
fn open_index(path: &Path, embedder: &dyn EmbeddingModel) -> Result<SimpleIndex> {
    let mut records =
        load_records(path).with_context(|| format!("Failed to read index {}", path.display()))?;

    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.vector.is_none())
        .map(|(i, _)| i)
        .collect();

    if !missing.is_empty() {
        debug!(
            "Embedding {} of {} records with {}",
            missing.len(),
            records.len(),
            embedder.model_id()
        );
        let texts: Vec<&str> = missing.iter().map(|&i| records[i].chunk.text.as_str()).collect();
        let vectors = embedder.embed(&texts).context("Failed to embed index records")?;
        for (i, vector) in missing.into_iter().zip(vectors) {
            records[i].vector = Some(vector);
        }
    }

    let index = SimpleIndex::from_records(records)
        .with_context(|| format!("Failed to build index from {}", path.display()))?;
    info!("Loaded index {} ({} dims)", path.display(), index.dimension());
    Ok(index)
}

fn build_engine(config: RagConfig, args: &RetrievalArgs, with_generator: bool) -> Result<QueryEngine> {
    let embedder: Arc<dyn EmbeddingModel> =
        Arc::from(create_embedder(&config.embedder).context("Failed to create embedder")?);
    let index = open_index(&args.index, embedder.as_ref())?;
    let generator_config = config.generator.clone();

    let mut engine = QueryEngine::new(config, Arc::new(index))
        .context("Failed to create query engine")?
        .with_embedder(embedder);

    if with_generator {
        // A missing generator is reported per query as a failed result.
        match create_generator(&generator_config) {
            Ok(generator) => engine = engine.with_generator(Arc::from(generator)),
            Err(e) => debug!("No generator: {}", e),
        }
    }

    Ok(engine)
}

/// Turn CLI flags into per-query overrides.
fn query_options(config: &RagConfig, args: &RetrievalArgs) -> Result<QueryOptions> {
    let mut opts = QueryOptions::new();

    if let Some(top_k) = args.top_k {
        opts = opts.with_top_k(top_k);
    }
    if args.expand {
        opts = opts.with_expansion(true);
    }

    if !args.pre.is_empty() || !args.post.is_empty() {
        let mut filter = config.filter.clone();
        for arg in &args.pre {
            let (key, condition) = parse_filter_arg(arg).context("Invalid --pre filter")?;
            filter.pre_filters.merge(key, condition);
        }
        for arg in &args.post {
            let (key, condition) = parse_filter_arg(arg).context("Invalid --post filter")?;
            filter.post_filters.merge(key, condition);
        }
        opts = opts.with_filter(filter);
    }

    Ok(opts)
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_search(style: &Style, config_path: Option<&Path>, query: &str, args: &RetrievalArgs) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let opts = query_options(&config, args)?;
    let engine = build_engine(config, args, false)?;

    let outcome = engine.retrieve_with(query, &[], &opts).context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome).unwrap_or_default());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", style.section("QUERY"));
    println!("{}", style.key_value("Intent", outcome.processed.intent.as_str()));
    println!("{}", style.key_value("Rewritten", &outcome.processed.rewritten));
    println!("{}", style.key_value("Top-k", &outcome.top_k.to_string()));
    println!();

    match &outcome.status {
        RetrievalStatus::NoResults { reason } => {
            println!("{}", style.message(MessageType::Info, &format!("No results: {}", reason)));
            if outcome.metrics.used_post_filter {
                println!("{}", style.message(MessageType::Hint, "Relax or drop --post filters"));
            }
        }
        RetrievalStatus::Complete => {
            println!("{}", style.section("RESULTS"));
            println!("{}", table::render_results_table(&outcome.candidates));
            let neighbors = outcome.context_chunks.len().saturating_sub(outcome.candidates.len());
            if neighbors > 0 {
                println!(
                    "{}",
                    style.message(MessageType::Info, &format!("{} neighboring chunk(s) added to context", neighbors))
                );
            }
        }
    }
    println!();

    println!(
        "{}",
        style.key_value(
            "Confidence",
            &style.confidence(outcome.confidence.level, outcome.confidence.score)
        )
    );
    println!("{}", style.message_detail("Reason", &outcome.confidence.reason));
    println!();

    print_metrics(style, &outcome.metrics);
    Ok(ExitCode::SUCCESS)
}

fn handle_ask(
    style: &Style,
    config_path: Option<&Path>,
    query: &str,
    history: &[String],
    args: &RetrievalArgs,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let opts = query_options(&config, args)?;
    let engine = build_engine(config, args, true)?;

    let history: Vec<ChatMessage> = history.iter().map(|q| ChatMessage::user(q.as_str())).collect();
    let result = engine.query_with(query, &history, &opts);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    } else {
        print_query_result(style, &result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn handle_analyze(style: &Style, config_path: Option<&Path>, query: &str, json: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let processed = QueryProcessor::new().process(query, &[]);

    if json {
        println!("{}", serde_json::to_string_pretty(&processed).unwrap_or_default());
        return Ok(ExitCode::SUCCESS);
    }

    let entities = &processed.entities;
    let join = |set: &std::collections::BTreeSet<String>| {
        if set.is_empty() {
            "-".to_string()
        } else {
            set.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };

    println!("{}", style.section("ANALYSIS"));
    println!("{}", style.key_value("Intent", processed.intent.as_str()));
    println!(
        "{}",
        style.key_value("Results", &config.retrieval.top_k.for_intent(processed.intent).to_string())
    );
    println!("{}", style.key_value("Expanded", &processed.expanded));
    println!("{}", style.key_value("Rewritten", &processed.rewritten));
    println!();
    println!("{}", style.section("ENTITIES"));
    println!("{}", style.key_value("Functions", &join(&entities.functions)));
    println!("{}", style.key_value("Classes", &join(&entities.classes)));
    println!("{}", style.key_value("Files", &join(&entities.files)));
    println!("{}", style.key_value("Variables", &join(&entities.variables)));
    println!("{}", style.key_value("Keywords", &join(&entities.keywords)));

    Ok(ExitCode::SUCCESS)
}

/// Outcome of validating one configuration file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigReport {
    path: Option<PathBuf>,
    exists: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
}

fn check_config(path: Option<&Path>) -> ConfigReport {
    let path = path.map(Path::to_path_buf).or_else(RagConfig::default_path);
    let exists = path.as_ref().is_some_and(|p| p.exists());
    let mut report = ConfigReport {
        path: path.clone(),
        exists,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    let Some(path) = path.filter(|_| exists) else {
        return report;
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            report.errors.push(format!("cannot read {}: {}", path.display(), e));
            return report;
        }
    };

    match RagConfig::from_yaml_str(&content) {
        Ok(config) => match config.validate() {
            Ok(warnings) => report.warnings = warnings,
            Err(e) => report.errors.push(e.to_string()),
        },
        Err(message) => report.errors.push(message),
    }

    report
}

fn handle_config_check(style: &Style, config_path: Option<&Path>, json: bool) -> Result<ExitCode> {
    let report = check_config(config_path);
    let code = if report.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        return Ok(code);
    }

    match (&report.path, report.exists) {
        (Some(path), true) => println!(
            "{}",
            style.message(MessageType::Info, &format!("Checked {}", style.file_path(&path.display().to_string())))
        ),
        (Some(path), false) => println!(
            "{}",
            style.message(
                MessageType::Skip,
                &format!("No config at {}, using defaults", path.display())
            )
        ),
        (None, _) => println!(
            "{}",
            style.message(MessageType::Skip, "No home directory, using defaults")
        ),
    }

    if !report.warnings.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Warn, &format!("{} warning(s):", report.warnings.len()))
        );
        for warning in &report.warnings {
            println!("  • {}", warning);
        }
    }

    if !report.errors.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Err, &format!("{} error(s):", report.errors.len()))
        );
        for error in &report.errors {
            println!("  • {}", error);
        }
    }

    if !report.errors.is_empty() {
        println!("{}", style.message(MessageType::Err, "Configuration has errors"));
    } else if !report.warnings.is_empty() {
        println!("{}", style.message(MessageType::Ok, "Configuration is valid with warnings"));
    } else {
        println!("{}", style.message(MessageType::Ok, "Configuration is valid"));
    }

    Ok(code)
}

fn handle_config_show(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let rendered = serde_json::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Output helpers
// ============================================================================

fn describe_pre_filter(decision: &PreFilterDecision) -> String {
    match decision {
        PreFilterDecision::NotConfigured => "not configured".to_string(),
        PreFilterDecision::Disabled => "disabled".to_string(),
        PreFilterDecision::Applied { selectivity } => {
            format!("applied (selectivity {:.2})", selectivity)
        }
        PreFilterDecision::TooRestrictive { selectivity } => {
            format!("skipped, too restrictive (selectivity {:.2})", selectivity)
        }
        PreFilterDecision::TooBroad { selectivity } => {
            format!("skipped, too broad (selectivity {:.2})", selectivity)
        }
        PreFilterDecision::NothingTranslatable { selectivity } => {
            format!("skipped, no translatable keys (selectivity {:.2})", selectivity)
        }
    }
}

fn print_metrics(style: &Style, metrics: &FilterMetrics) {
    println!("{}", style.section("FILTERING"));
    println!("{}", style.key_value("Pre-filter", &describe_pre_filter(&metrics.pre_filter)));
    if metrics.used_pre_filter {
        println!(
            "{}",
            style.message_detail("Corpus excluded", &format::format_percent(metrics.pre_filter_reduction))
        );
    }
    println!(
        "{}",
        style.key_value(
            "Candidates",
            &format!(
                "{} requested, {} retrieved, {} after post-filter, {} returned",
                metrics.requested, metrics.retrieved_count, metrics.post_filter_count, metrics.returned_count
            )
        )
    );
    if metrics.used_post_filter {
        println!(
            "{}",
            style.message_detail("Post-filter removed", &format::format_percent(metrics.post_filter_reduction))
        );
    }
    println!("{}", style.key_value("Estimated recall", &format!("{:.2}", metrics.estimated_recall)));
    println!(
        "{}",
        style.key_value(
            "Latency",
            &format!(
                "{} (pre {}, search {}, post {})",
                format::format_ms(metrics.total_latency_ms),
                format::format_ms(metrics.pre_filter_latency_ms),
                format::format_ms(metrics.vector_search_latency_ms),
                format::format_ms(metrics.post_filter_latency_ms)
            )
        )
    );
}

fn print_query_result(style: &Style, result: &QueryResult) {
    if let Some(error) = &result.error {
        let hint = match error.kind.as_str() {
            "generation_failure" => Some("Configure a generator (generator.provider) and build with --features ollama"),
            "timeout" => Some("Raise timeouts.generationMs or timeouts.searchMs in the config"),
            "index_unavailable" => Some("Check the --index file"),
            _ => None,
        };
        eprintln!("{}", style.error_with_context("Query failed", Some(&error.message), hint));
        return;
    }

    println!("{}", style.section("ANSWER"));
    println!("{}", result.answer);
    println!();

    if !result.sources.is_empty() {
        println!("{}", style.section("SOURCES"));
        println!("{}", table::render_sources_table(&result.sources));
        println!();
    }

    println!("{}", style.key_value("Intent", result.intent.as_str()));
    println!(
        "{}",
        style.key_value("Confidence", &style.confidence(result.confidence.level, result.confidence.score))
    );
    println!("{}", style.message_detail("Reason", &result.confidence.reason));
    if result.cached {
        println!("{}", style.message(MessageType::Info, "Served from cache"));
    }
    if let Some(metrics) = &result.metrics {
        println!();
        print_metrics(style, metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args_parse() {
        let cli = Cli::try_parse_from([
            "reporag",
            "search",
            "how does login work",
            "--index",
            "chunks.jsonl",
            "--pre",
            "language=python",
            "--post",
            "complexity_score<=5",
            "--top-k",
            "3",
        ])
        .unwrap();

        let Command::Search { query, retrieval } = cli.command else {
            panic!("expected search");
        };
        assert_eq!(query, "how does login work");
        assert_eq!(retrieval.pre, vec!["language=python"]);
        assert_eq!(retrieval.post, vec!["complexity_score<=5"]);
        assert_eq!(retrieval.top_k, Some(3));
    }

    fn args(pre: &[&str], post: &[&str]) -> RetrievalArgs {
        RetrievalArgs {
            index: PathBuf::from("chunks.jsonl"),
            top_k: None,
            pre: pre.iter().map(|s| s.to_string()).collect(),
            post: post.iter().map(|s| s.to_string()).collect(),
            expand: false,
            json: false,
        }
    }

    #[test]
    fn test_query_options_default_without_flags() {
        let opts = query_options(&RagConfig::default(), &args(&[], &[])).unwrap();
        assert!(opts.is_default());
    }

    #[test]
    fn test_query_options_merge_ranges() {
        let opts = query_options(
            &RagConfig::default(),
            &args(&["language=python"], &["complexity_score>=2", "complexity_score<=5"]),
        )
        .unwrap();

        let filter = opts.filter.unwrap();
        assert_eq!(filter.pre_filters.len(), 1);
        assert_eq!(filter.post_filters.len(), 1);
        assert!(filter.post_filters.get("complexity_score").is_some());
    }

    #[test]
    fn test_query_options_rejects_bad_filter() {
        assert!(query_options(&RagConfig::default(), &args(&["nonsense"], &[])).is_err());
    }

    #[test]
    fn test_describe_pre_filter() {
        assert_eq!(describe_pre_filter(&PreFilterDecision::NotConfigured), "not configured");
        assert_eq!(
            describe_pre_filter(&PreFilterDecision::TooBroad { selectivity: 0.7 }),
            "skipped, too broad (selectivity 0.70)"
        );
        assert_eq!(
            describe_pre_filter(&PreFilterDecision::NothingTranslatable { selectivity: 1.0 }),
            "skipped, no translatable keys (selectivity 1.00)"
        );
    }

    #[test]
    fn test_check_missing_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = check_config(Some(&dir.path().join("absent.yaml")));
        assert!(!report.exists);
        assert!(report.errors.is_empty());
    }
}
