//! review-harvest: scrape a marketplace category, analyze the dataset,
//! annotate reviews.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use review_harvest_cli::commands;
use review_harvest_cli::config::{load_config, HarvestConfig};

#[derive(Parser)]
#[command(
    name = "review-harvest",
    about = "Collect product listings and reviews, analyze them, and annotate a sample with an LLM",
    version,
    after_help = "Run 'review-harvest <command> --help' for details on each command."
)]
struct Cli {
    /// JSON config file (also REVIEW_HARVEST_CONFIG, or ./review-harvest.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a category page and scrape every product found
    Scrape {
        /// Category page URL
        #[arg(long)]
        url: Option<String>,
        /// Maximum number of products
        #[arg(long)]
        max_items: Option<usize>,
        /// Raw CSV output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },
    /// Clean the raw scrape, print statistics, write the annotation sample
    Analyze {
        /// Raw CSV to read
        #[arg(long)]
        input: Option<PathBuf>,
        /// Cleaned CSV output path
        #[arg(long)]
        clean_output: Option<PathBuf>,
        /// Annotation sample output path
        #[arg(long)]
        sample_output: Option<PathBuf>,
        /// Also write the statistics report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Annotate sampled reviews with GigaChat
    Annotate {
        /// Sample CSV with a ReviewText column
        #[arg(long)]
        input: Option<PathBuf>,
        /// Annotations CSV output path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Scrape, analyze and annotate in sequence
    Run {
        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "review-harvest", &mut std::io::stdout());
        return Ok(());
    }

    let mut config: HarvestConfig = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape {
            url,
            max_items,
            output,
            headless,
        } => {
            if let Some(url) = url {
                config.scrape.category_url = url;
            }
            if let Some(max_items) = max_items {
                config.scrape.max_items = max_items;
            }
            if let Some(output) = output {
                config.scrape.output = output;
            }
            config.browser.headless |= headless;
            commands::scrape::run(&config).await?;
        }
        Commands::Analyze {
            input,
            clean_output,
            sample_output,
            report,
        } => {
            if input.is_some() {
                config.analysis.input = input;
            }
            if let Some(path) = clean_output {
                config.analysis.clean_output = path;
            }
            if let Some(path) = sample_output {
                config.analysis.sample_output = path;
            }
            if report.is_some() {
                config.analysis.report_output = report;
            }
            commands::analyze::run(&config)?;
        }
        Commands::Annotate { input, output } => {
            if input.is_some() {
                config.annotation.input = input;
            }
            if let Some(path) = output {
                config.annotation.output = path;
            }
            commands::annotate::run(&config).await?;
        }
        Commands::Run { headless } => {
            config.browser.headless |= headless;
            // Each stage reads what the previous one wrote.
            config.analysis.input = None;
            config.annotation.input = None;
            commands::scrape::run(&config).await?;
            commands::analyze::run(&config)?;
            commands::annotate::run(&config).await?;
        }
        Commands::Doctor => {
            commands::doctor::run(&config, cli.config.as_deref())?;
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = dispatch(cli).await {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
}
