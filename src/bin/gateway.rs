//! Home Agent Telegram Gateway
//!
//! The main entry point: loads configuration, wires storage, the model
//! transport, tools and the chat service together, then polls Telegram.

use clap::{Parser, Subcommand};
use home_agent::agent::{
    register_profile_tools, Agent, ModelTransport, OpenRouterClient, RetryingTransport,
    ToolRegistry, TransportResolver,
};
use home_agent::bot::ChatService;
use home_agent::config::{
    apply_env_overrides, config_path, load_config, load_config_from_path, save_config,
    validate_config, Config, LoggingConfig,
};
use home_agent::database::SqliteStore;
use home_agent::history::HistoryManager;
use home_agent::mcp::McpRegistry;
use home_agent::profile::ProfileManager;
use home_agent::{telegram, Error, Result, VERSION};

use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "home-agent",
    author = "Home Agent Contributors",
    version = VERSION,
    about = "Home Agent - a personal home-server assistant on Telegram",
    long_about = None
)]
struct Cli {
    /// Configuration file (JSON5 or TOML)
    #[arg(long, short, global = true, env = "HOME_AGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default)
    Run,

    /// Validate the configuration and report problems
    CheckConfig,

    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load(cli.config.as_deref())?;
            init_logging(&config.logging);
            run(config).await
        }
        Commands::CheckConfig => check_config(&load(cli.config.as_deref())?),
        Commands::InitConfig { force } => init_config(cli.config.unwrap_or_else(config_path), force),
    }
}

fn load(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = load_config_from_path(path)?;
            apply_env_overrides(&mut config)?;
            Ok(config)
        }
        None => load_config(),
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("home_agent={},teloxide=info,warn", logging.level))
    });

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Starting Home Agent v{}", VERSION);

    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!("Config: {}", warning);
    }
    if !report.valid {
        for issue in &report.errors {
            error!("Config: {}", issue);
        }
        return Err(Error::Config("Invalid configuration, run `home-agent check-config`".into()));
    }

    let openrouter = config.provider.openrouter.clone().ok_or_else(|| {
        Error::Config("OpenRouter not configured. Set OPENROUTER_API_KEY environment variable.".into())
    })?;
    let telegram_config = config.channels.telegram.clone().ok_or_else(|| {
        Error::Config("Telegram not configured. Set TELEGRAM_BOT_TOKEN environment variable.".into())
    })?;

    // Storage
    info!("Opening database at {}", config.storage.sqlite.path.display());
    let store = Arc::new(SqliteStore::connect(&config.storage.sqlite).await?);
    let profiles = ProfileManager::new(store.clone());
    let history = HistoryManager::new(store);

    // Model transport: OpenRouter behind rate-limit retries, built on first use
    let retry = openrouter.retry.clone();
    let resolver: TransportResolver = Arc::new(move |model: &str| -> Result<Arc<dyn ModelTransport>> {
        let client = OpenRouterClient::new(openrouter.clone(), model)?;
        Ok(Arc::new(client) as Arc<dyn ModelTransport>)
    });
    let transport = RetryingTransport::lazy(config.agent.model.clone(), resolver)
        .with_config(&retry)
        .with_on_retry(Arc::new(|attempt: u32, delay: Duration| {
            warn!("Rate limited by OpenRouter, retry {} in {:?}", attempt + 1, delay);
        }));
    info!("Using LLM model: {}", config.agent.model);

    // Tools
    let mut tools = ToolRegistry::new();
    register_profile_tools(&mut tools);

    let registry = McpRegistry::from_configs(config.mcp.all_servers());
    info!("Registered MCP servers: {:?}", registry.tool_names());
    for bridge in registry.connect_all().await {
        tools.register(bridge);
    }
    info!("Agent tools: {}", tools.names().join(", "));

    let agent = Agent::new(Arc::new(transport), tools, &config.agent)?;
    let service = Arc::new(ChatService::new(
        telegram_config.allow_from.clone(),
        profiles,
        history,
        agent,
    ));
    info!("Whitelisted users: {:?}", telegram_config.allow_from);

    let bot = Bot::new(telegram_config.bot_token.expose_secret());
    let me = bot.get_me().await?;
    info!("Telegram bot started: @{}", me.username());

    telegram::run(bot, service).await;

    info!("Gateway shutdown complete");
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    let report = validate_config(config);

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for issue in &report.errors {
        println!("error: {}", issue);
    }

    if report.valid {
        println!("Configuration OK");
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} configuration error(s)",
            report.errors.len()
        )))
    }
}

fn init_config(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists, use --force to overwrite",
            path.display()
        )));
    }

    save_config(&Config::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set TELEGRAM_BOT_TOKEN and OPENROUTER_API_KEY in the environment or .env");
    Ok(())
}
