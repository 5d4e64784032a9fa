//! Dorker CLI - search-dork retrieval from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dorker::{engine, AdminGate, Config, Dispatcher, RateLimiter, Retriever, SearchRequest};

/// Dorker - search-dork retrieval engine
#[derive(Parser)]
#[command(name = "dorker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings that take precedence over the configuration file.
#[derive(Args)]
struct Overrides {
    /// Proxy URLs, comma-separated (e.g. http://127.0.0.1:8080,socks5://127.0.0.1:1080)
    #[arg(long = "proxy", env = "DORKER_PROXIES", value_delimiter = ',', global = true)]
    proxies: Vec<String>,

    /// Route requests through the proxy pool
    #[arg(
        long,
        env = "DORKER_USE_PROXIES",
        num_args = 0..=1,
        default_missing_value = "true",
        global = true
    )]
    use_proxies: Option<bool>,

    /// Admin user id
    #[arg(long, env = "ADMIN_ID", global = true)]
    admin_id: Option<u64>,

    /// Searches allowed per user per hour
    #[arg(long, env = "DORKER_RATE_LIMIT", global = true)]
    rate_limit: Option<u32>,

    /// Rate-limit snapshot file
    #[arg(long, env = "DORKER_RATE_LIMIT_FILE", global = true)]
    rate_limit_file: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long, env = "CHROME", global = true)]
    chrome_path: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if !self.proxies.is_empty() {
            config.proxies = self.proxies;
        }
        if let Some(use_proxies) = self.use_proxies {
            config.use_proxies = use_proxies;
        }
        if let Some(admin_id) = self.admin_id {
            config.admin_id = admin_id;
        }
        if let Some(rate_limit) = self.rate_limit {
            config.rate_limit = rate_limit;
        }
        if let Some(path) = self.rate_limit_file {
            config.rate_limit_file = path;
        }
        if let Some(path) = self.chrome_path {
            config.chrome_path = Some(path);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one dork query
    Search(SearchArgs),

    /// List supported search engines
    Engines,

    /// Interactive command shell (/dork, /engine, /status, ...)
    Shell(ShellArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Dork query, e.g. 'intitle:"index of" filetype:sql'
    query: String,

    /// Search engine: google, bing or duckduckgo
    #[arg(short, long, default_value = "google")]
    engine: String,

    /// Maximum number of results to display
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
struct ShellArgs {
    /// User id the commands run as
    #[arg(short, long, default_value = "0")]
    user_id: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;

    match cli.command {
        Commands::Search(args) => run_search(&config, args).await,
        Commands::Engines => list_engines(),
        Commands::Shell(args) => run_shell(&config, args).await,
    }
}

fn list_engines() -> Result<()> {
    println!("Available search engines:\n");
    for descriptor in engine::ENGINES.iter() {
        println!("  {:<12} {}", descriptor.name, descriptor.url_template);
    }
    println!();
    println!("Usage: dorker search \"intext:password filetype:txt\" -e bing");
    Ok(())
}

async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let Some(descriptor) = engine::lookup(&args.engine) else {
        anyhow::bail!(
            "Unknown engine '{}'. Available: {}",
            args.engine,
            engine::engine_names().join(", ")
        );
    };

    let retriever = Retriever::from_config(config)?;
    let request = SearchRequest::new(args.query.as_str(), descriptor.name);
    let retrieval = retriever.retrieve_detailed(&request).await;

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nSearch results for \"{}\" on {} ({} results via {} in {}ms):\n",
                args.query,
                descriptor.name,
                retrieval.results.len(),
                retrieval.strategy.unwrap_or("none"),
                retrieval.duration_ms
            );

            for (i, result) in retrieval.results.iter().take(args.limit).enumerate() {
                println!("{}. {}", i + 1, result.title);
                println!("   URL: {}", result.link);
                println!();
            }

            if retrieval.results.is_empty() {
                for attempt in &retrieval.attempts {
                    eprintln!("  {}: {:?}", attempt.strategy, attempt.outcome);
                }
                eprintln!(
                    "No results. Try another engine, e.g. -e {}",
                    descriptor.alternate().name.to_lowercase()
                );
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = retrieval.results.iter().take(args.limit).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Compact => {
            for result in retrieval.results.iter().take(args.limit) {
                println!("{}\t{}", result.title, result.link);
            }
        }
    }

    Ok(())
}

async fn run_shell(config: &Config, args: ShellArgs) -> Result<()> {
    let retriever = Arc::new(Retriever::from_config(config)?);
    let limiter = Arc::new(RateLimiter::load(config.rate_limit_file.clone(), config.rate_limit).await);
    let admin = Arc::new(AdminGate::new(config.admin_id));
    let dispatcher = Dispatcher::new(retriever, limiter, admin);

    info!("Shell started for user {}", args.user_id);
    eprintln!("Dorker shell. Type /help for commands, Ctrl-D to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        dispatcher
            .handle_with(args.user_id, &line, |reply| println!("{}\n", reply))
            .await;
    }

    Ok(())
}
