use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use relnotes::ai::ReleaseNoteGenerator;
use relnotes::config::{Config, Overrides, Settings};
use relnotes::{report, Analyzer, Provider};

#[derive(Parser)]
#[command(name = "relnotes")]
#[command(about = "Generate release notes from GitHub or GitLab history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: relnotes.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch history, generate release notes and write them to a file
    Generate {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Output path for the release notes (default: release_notes.md)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Text-generation backend: ollama, anthropic, openai or gemini
        #[arg(long)]
        ai_provider: Option<String>,

        /// Model name passed to the backend
        #[arg(long)]
        model: Option<String>,
    },

    /// Fetch and print normalized commits and merge requests
    Fetch {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Print the history as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the provider and identifier parsed from a repository URL
    Detect {
        url: String,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Repository URL (env: REPO_URL)
    #[arg(short, long)]
    repo: Option<String>,

    /// Branch to analyze (env: BRANCH_NAME)
    #[arg(short, long)]
    branch: Option<String>,

    /// Force the provider instead of detecting it from the URL host
    #[arg(long)]
    provider: Option<Provider>,

    /// Maximum commits to fetch (env: MAX_COMMITS, default: 5)
    #[arg(long)]
    max_commits: Option<usize>,

    /// Maximum merge/pull requests to fetch (env: MAX_MERGE_REQUESTS, default: 5)
    #[arg(long)]
    max_merge_requests: Option<usize>,

    /// Commits/merge requests enriched at once (default: 1)
    #[arg(long)]
    concurrency: Option<usize>,
}

impl FetchArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            repo_url: self.repo,
            branch: self.branch,
            provider: self.provider,
            max_commits: self.max_commits,
            max_merge_requests: self.max_merge_requests,
            concurrency: self.concurrency,
            ..Default::default()
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relnotes={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            fetch,
            output,
            ai_provider,
            model,
        } => {
            let overrides = Overrides {
                output,
                ai_provider,
                model,
                ..fetch.into_overrides()
            };
            let settings = load_settings(cli.config, overrides)?;
            cmd_generate(&settings)
        }
        Commands::Fetch { fetch, json } => {
            let settings = load_settings(cli.config, fetch.into_overrides())?;
            cmd_fetch(&settings, json)
        }
        Commands::Detect { url } => cmd_detect(&url),
    }
}

fn load_settings(config_path: Option<PathBuf>, overrides: Overrides) -> Result<Settings> {
    let config = Config::discover(config_path.as_deref())?;
    Ok(Settings::from_env(config, overrides)?)
}

#[tokio::main]
async fn cmd_generate(settings: &Settings) -> Result<()> {
    // Notes from an earlier run must not survive a failure of this one
    report::remove_stale_output(&settings.output).with_context(|| {
        format!("Could not remove old {}", settings.output.display())
    })?;

    // Build the generator first so a bad [ai] section fails before any request
    let generator = ReleaseNoteGenerator::new(&settings.ai)?;
    let analyzer = Analyzer::new(settings)?;

    println!(
        "{} Analyzing {} repo: {} on branch: {}",
        "🔍".cyan(),
        analyzer.provider().to_string().bold(),
        settings.repo_url,
        analyzer.branch().green()
    );

    let history = analyzer.fetch_history().await?;
    report::print_commits(&history.commits);
    report::print_merge_requests(&history.merge_requests);

    println!(
        "\n{} Generating release notes with {}...",
        "✍".cyan(),
        generator.model().bold()
    );
    let notes = generator
        .generate(&history.commits, &history.merge_requests)
        .await?;

    println!(
        "\n{} for {} (Branch: {})\n",
        "Generated Release Notes".bold(),
        settings.repo_url,
        settings.branch
    );
    println!("{}", notes);

    report::write_release_notes(&settings.output, &notes)
        .with_context(|| format!("Could not write {}", settings.output.display()))?;
    println!(
        "\n{} Release notes written: {}",
        "📝".cyan(),
        settings.output.display().to_string().green()
    );

    Ok(())
}

#[tokio::main]
async fn cmd_fetch(settings: &Settings, json: bool) -> Result<()> {
    let analyzer = Analyzer::new(settings)?;
    let history = analyzer.fetch_history().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!(
        "{} {} {} @ {}",
        "📦".cyan(),
        history.provider.to_string().bold(),
        history.repository,
        history.branch.green()
    );
    report::print_commits(&history.commits);
    report::print_merge_requests(&history.merge_requests);
    Ok(())
}

fn cmd_detect(url: &str) -> Result<()> {
    let provider = relnotes::detect_provider(url)?;
    let identifier = relnotes::parse_repo_url(url, provider)?;

    println!("{} {}", "provider:".dimmed(), provider.to_string().cyan());
    println!("{} {}", "repository:".dimmed(), identifier);
    Ok(())
}
