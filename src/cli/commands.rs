use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::analyzer::{AnalyzerOptions, SyllabusAnalyzer};
use crate::infra::{ConfigManager, CredentialResolver, Credentials, UserConfig};
use crate::llm::GeminiClient;
use crate::prompts::*;

#[derive(Parser)]
#[command(name = "syllabus-events")]
#[command(about = "Turn a course syllabus into calendar-ready events", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log every attempt at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding config.yml (defaults to the user config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract upcoming events from a syllabus PDF
    Extract {
        /// Path to the syllabus document
        file: PathBuf,

        #[command(flatten)]
        event: EventArgs,

        /// IANA timezone for naive times (e.g. America/New_York)
        #[arg(long)]
        timezone: Option<String>,

        /// API key to use instead of credential files; repeat for fallbacks
        #[arg(long = "api-key")]
        api_keys: Vec<String>,

        /// Model to try; repeat to override the configured priority list
        #[arg(long = "model")]
        models: Vec<String>,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the instruction sent to the model
    Prompt {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Write a default configuration file
    Init,

    /// Check configuration and credentials
    Health,
}

#[derive(Args)]
pub struct EventArgs {
    /// Only request these categories; repeat for several
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Google Calendar colorId for every event
    #[arg(long)]
    pub color_id: Option<String>,
}

impl EventArgs {
    fn options(self, config: &UserConfig, timezone: Option<String>) -> AnalyzerOptions {
        AnalyzerOptions {
            categories: (!self.categories.is_empty()).then_some(self.categories),
            color_id: self.color_id.unwrap_or_else(|| config.color_id.clone()),
            user_timezone: timezone.unwrap_or_else(|| config.timezone.clone()),
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => ConfigManager::default_dir().context("Could not find a config directory")?,
    };

    match cli.command {
        Commands::Extract {
            file,
            event,
            timezone,
            api_keys,
            models,
            output,
            compact,
        } => {
            let config = ConfigManager::new(&config_dir)?.get();
            let options = event.options(&config, timezone);
            extract_command(&config, file, options, api_keys, models, output, compact).await
        }
        Commands::Prompt { event } => {
            let config = ConfigManager::new(&config_dir)?.get();
            println!("{}", event.options(&config, None).prompt());
            Ok(())
        }
        Commands::Init => init_command(config_dir),
        Commands::Health => health_command(config_dir).await,
    }
}

/// Logs go to stderr so stdout stays clean JSON.
fn init_logging(verbose: bool) {
    let default = if verbose { "syllabus_events=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Ignore the error when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn extract_command(
    config: &UserConfig,
    file: PathBuf,
    options: AnalyzerOptions,
    api_keys: Vec<String>,
    models: Vec<String>,
    output: Option<PathBuf>,
    compact: bool,
) -> Result<()> {
    let credentials = if api_keys.is_empty() {
        CredentialResolver::from_config(config).resolve().await?
    } else {
        Credentials::new(api_keys)
    };
    let models = if models.is_empty() { config.models.clone() } else { models };

    let client = GeminiClient::new(Duration::from_secs(config.request_timeout_secs));
    let analyzer = SyllabusAnalyzer::load_file(&file, options, &credentials, &models, &client).await?;

    if analyzer.events().is_empty() {
        if analyzer.is_exhausted() {
            eprintln!("{} {}", "⚠️".yellow(), MSG_ALL_ATTEMPTS_FAILED.yellow().bold());
            for failure in analyzer.failures() {
                eprintln!(
                    "  {} key #{} / {}: {}",
                    "✗".red(),
                    failure.credential_index + 1,
                    failure.model,
                    failure.reason
                );
            }
        } else {
            eprintln!("{}", MSG_NO_EVENTS);
        }
    }

    let json = if compact {
        serde_json::to_string(analyzer.events())?
    } else {
        serde_json::to_string_pretty(analyzer.events())?
    };

    match output {
        Some(path) => {
            std::fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✓ Wrote {} events to {}", analyzer.events().len(), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn init_command(config_dir: PathBuf) -> Result<()> {
    let path = config_dir.join("config.yml");
    if ConfigManager::create_default(&config_dir)? {
        println!("{} {}", MSG_CONFIG_CREATED.green(), path.display());
    } else {
        println!("{} {}", MSG_CONFIG_EXISTS, path.display());
    }
    Ok(())
}

async fn health_command(config_dir: PathBuf) -> Result<()> {
    println!("{}", MSG_HEALTH_CHECK.bold());

    let mut all_ok = true;

    let config = match ConfigManager::new(&config_dir) {
        Ok(manager) => {
            println!("{} ({})", MSG_CONFIG_OK, manager.path().display());
            manager.get()
        }
        Err(e) => {
            println!("{} {}: {:#}", "✗".red(), MSG_CONFIG_ERROR, e);
            all_ok = false;
            UserConfig::default()
        }
    };
    println!("  timezone: {}, colorId: {}", config.timezone, config.color_id);

    match CredentialResolver::from_config(&config).resolve().await {
        Ok(credentials) => println!("{} ({} keys)", MSG_CREDENTIALS_OK, credentials.len()),
        Err(e) => {
            println!("{} {}: {}", "✗".red(), MSG_CREDENTIALS_ERROR, e);
            all_ok = false;
        }
    }

    println!("{}", MSG_MODELS_HEADER);
    for (i, model) in config.models.iter().enumerate() {
        println!("  {}. {}", i + 1, model);
    }
    if config.models.is_empty() {
        println!("  {} none configured", "⚠️".yellow());
        all_ok = false;
    }

    if all_ok {
        println!("{}", MSG_ALL_SYSTEMS_OK.green().bold());
    } else {
        println!("{}", MSG_ISSUES_DETECTED.yellow().bold());
    }

    Ok(())
}
