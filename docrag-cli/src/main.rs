use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use docrag_core::chat::{ChatSession, ChatTurn, Confidence, Role};
use docrag_core::config::Config;
use docrag_core::extractor::{save as save_records, Extractor};
use docrag_core::rag::RagEngine;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const EXAMPLE_QUESTIONS: &[&str] = &[
    "What is workspace_id?",
    "Which attribute holds the ticket priority?",
    "What type is the due_by field?",
    "How do I set the requester of a ticket?",
];

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Ask questions about a scraped documentation table", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scrape the attribute table into a JSON-lines file")]
    Scrape {
        #[arg(long, help = "Page to fetch (defaults to extractor.url)")]
        url: Option<String>,

        #[arg(long, help = "Element id the table follows")]
        anchor: Option<String>,

        #[arg(short, long, help = "Output file (defaults to extractor.output)")]
        out: Option<PathBuf>,

        #[arg(long, help = "Parse a saved HTML file instead of fetching")]
        html_file: Option<PathBuf>,
    },

    #[command(about = "Embed the scraped records and rebuild the index")]
    Index {
        #[arg(short, long, help = "Records file (defaults to extractor.output)")]
        input: Option<PathBuf>,
    },

    #[command(about = "Show the nearest records for a query without calling the model")]
    Search {
        query: String,

        #[arg(short, help = "Number of records to retrieve")]
        k: Option<usize>,
    },

    #[command(about = "Answer a single question")]
    Ask {
        query: String,

        #[arg(short, help = "Number of records to retrieve")]
        k: Option<usize>,
    },

    #[command(about = "Start an interactive question session")]
    Chat {
        #[arg(short, help = "Number of records to retrieve")]
        k: Option<usize>,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docrag_core=info,docrag=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Scrape {
            url,
            anchor,
            out,
            html_file,
        } => scrape(config, url, anchor, out, html_file).await,
        Commands::Index { input } => index(&config, input).await,
        Commands::Search { query, k } => search(&config, &query, k).await,
        Commands::Ask { query, k } => ask(&config, &query, k).await,
        Commands::Chat { k } => chat(&config, k).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(&config),
        },
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        info!(path = %path.display(), "Config file not found; using defaults");
        Ok(Config::default())
    }
}

async fn scrape(
    mut config: Config,
    url: Option<String>,
    anchor: Option<String>,
    out: Option<PathBuf>,
    html_file: Option<PathBuf>,
) -> Result<()> {
    if let Some(anchor) = anchor {
        config.extractor.anchor = anchor;
    }
    let url = url.unwrap_or_else(|| config.extractor.url.clone());
    let out = out.unwrap_or_else(|| config.extractor.output.clone());
    let extractor = Extractor::new(config.extractor).context("Failed to create HTTP client")?;

    let records = match html_file {
        Some(path) => {
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            extractor.extract_html(&html, &url)?
        }
        None => extractor.extract(&url).await?,
    };
    save_records(&records, &out)?;

    println!(
        "{} Wrote {} docs to {}",
        "✓".green().bold(),
        records.len(),
        out.display()
    );
    Ok(())
}

async fn index(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.extractor.output.clone());
    let engine = RagEngine::new(config).await?;

    println!("{} Indexing {}...", "→".blue(), input.display());
    let summary = engine
        .build_index(&input)
        .await
        .context("Indexing failed")?;

    println!(
        "{} Saved index ({} vectors, {} dims, {}) and metadata.",
        "✓".green().bold(),
        summary.records,
        summary.dimension,
        summary.manifest.model.cyan()
    );
    Ok(())
}

async fn search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let engine = RagEngine::new(config).await?;
    let retriever = engine.open_retriever().await?;
    let k = k.unwrap_or(config.storage.top_k);

    let hits = retriever.search(query, k).await?;
    if hits.is_empty() {
        println!("{}", "No results.".yellow());
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {} ({}) {}",
            i + 1,
            hit.record.attribute.cyan().bold(),
            hit.record.r#type,
            format!("distance {:.4}", hit.distance).dimmed()
        );
        println!("    {}", hit.record.description);
    }
    Ok(())
}

/// Checks the API key, then builds the providers and opens the index.
async fn open_session(config: &Config) -> Result<ChatSession> {
    let engine = RagEngine::new(config).await?;
    let session = engine.open_session().await?;
    info!(records = session.retriever().len(), "Ready");
    Ok(session)
}

async fn ask(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let session = open_session(config).await?;
    let turn = session.ask(query, k).await?;
    print_turn(&turn);
    Ok(())
}

async fn chat(config: &Config, k: Option<usize>) -> Result<()> {
    let mut session = open_session(config).await?;
    if let Some(k) = k {
        session.set_default_k(k);
    }

    println!("{}", "docrag chat".bold().green());
    println!(
        "{} records indexed. Type {} for commands, {} to leave.",
        session.retriever().len(),
        "/help".cyan(),
        "exit".cyan()
    );

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        print!("\n{} ", ">".bold().blue());
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();

        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/help" => print_help(),
            "/clear" => {
                session.clear();
                println!("{}", "History cleared.".dimmed());
            }
            "/history" => {
                let history = session.history();
                if history.is_empty() {
                    println!("{}", "No history yet.".dimmed());
                }
                for turn in &history {
                    match turn.role {
                        Role::User => println!("{} {}", "you:".bold(), turn.text),
                        Role::Assistant => print_turn(turn),
                    }
                }
            }
            "/examples" => {
                for example in EXAMPLE_QUESTIONS {
                    println!("  {}", example.cyan());
                }
            }
            _ if line.starts_with("/k") => match line[2..].trim().parse::<usize>() {
                Ok(k) if k > 0 => {
                    session.set_default_k(k);
                    println!("{} k = {}", "✓".green(), k);
                }
                _ => println!("{} usage: /k N (N >= 1)", "✗".red()),
            },
            _ if line.starts_with('/') => {
                println!("{} Unknown command {}", "✗".red(), line);
            }
            query => match session.ask(query, None).await {
                Ok(turn) => print_turn(&turn),
                Err(e) => println!("{} {}", "✗".red().bold(), e),
            },
        }
    }

    Ok(())
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}   clear the conversation", "/clear".cyan());
    println!("  {} show the conversation", "/history".cyan());
    println!("  {}     set how many records to retrieve", "/k N".cyan());
    println!("  {} sample questions", "/examples".cyan());
    println!("  {}    leave", "exit".cyan());
}

fn confidence_label(confidence: Confidence) -> ColoredString {
    let label = format!("{} confidence", confidence);
    match confidence {
        Confidence::High => label.green().bold(),
        Confidence::Medium => label.yellow().bold(),
        Confidence::Low => label.red().bold(),
    }
}

fn print_turn(turn: &ChatTurn) {
    if turn.is_error {
        println!("{}", turn.text.red());
        return;
    }

    println!("{}", turn.text);
    if let Some(confidence) = turn.confidence {
        println!("\n{}", confidence_label(confidence));
    }
    if !turn.sources.is_empty() {
        println!("{}", "Sources:".bold());
        for source in turn.sources.iter().take(3) {
            println!(
                "  • {} ({}) {} {}",
                source.attribute.cyan(),
                source.r#type,
                source.source_url.dimmed(),
                format!("score {:.3}", source.score).dimmed()
            );
        }
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:        {:?}", config.llm.provider);
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Max Tokens:      {}", config.llm.max_output_tokens);
    println!("  API Key Env:     {}", config.llm.api_key_env);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:           {}", config.embedding.model.cyan());
    println!("  Base URL:        {}", config.embedding.base_url);
    println!("  Batch Size:      {}", config.embedding.batch_size);
    println!();
    println!("{}", "Extractor:".bold());
    println!("  URL:             {}", config.extractor.url);
    println!("  Anchor:          {}", config.extractor.anchor);
    println!("  Output:          {}", config.extractor.output.display());
    println!();
    println!("{}", "Storage:".bold());
    println!("  Index:           {}", config.storage.index_path.display());
    println!("  Metadata:        {}", config.storage.metadata_path.display());
    println!("  Manifest:        {}", config.storage.manifest_path.display());
    println!("  Top K:           {}", config.storage.top_k);
    println!();
    println!("{}", "Confidence:".bold());
    println!("  High below:      {}", config.confidence.high_below);
    println!("  Medium below:    {}", config.confidence.medium_below);
    println!();
    println!("{}", "Raw YAML:".bold());
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);

    Ok(())
}
