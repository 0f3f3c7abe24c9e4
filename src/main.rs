//! Binary entrypoint for the Chorebot CLI.
//!
//! Commands:
//! - `start` - run the bot, long-polling the Telegram Bot API
//! - `init` - write a starter `config.toml`
//! - `status` - print balances and the reward catalog
//! - `set-webhook [--url <url>]` - point the Bot API at an external webhook receiver
//! - `delete-webhook` - remove the webhook so polling works again
//!
//! See the library crate docs for module-level details: `chorebot::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use chorebot::config::Config;
use chorebot::ledger::{Ledger, SledRecordStore};

#[derive(Parser)]
#[command(name = "chorebot")]
#[command(about = "A household chore and reward points tracker for Telegram")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Start,
    /// Write a default configuration file
    Init,
    /// Show balances and rewards
    Status,
    /// Register the webhook URL with the Bot API, for an external webhook receiver.
    ///
    /// This binary only long-polls; `start` removes the webhook again.
    SetWebhook {
        /// Full URL; defaults to https://<bot.hostname><bot.webhook_path>
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Remove the webhook registration
    DeleteWebhook,
}

const WEBHOOK_POLLING_NOTICE: &str = "chorebot only receives updates by long polling; \
while this webhook is set, updates go to the external receiver and `start` will delete it";

async fn load_config(path: &str) -> Result<Config> {
    let mut config = Config::load(path).await?;
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        info!("Initializing new configuration");
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = load_config(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);

    match cli.command {
        Commands::Init => {}
        Commands::Start => {
            config.validate()?;
            run_bot(config).await?;
        }
        Commands::Status => {
            let store = SledRecordStore::open(config.storage.ledger_path())?;
            let ledger = Ledger::new(store);
            println!("[{}] Balances", config.bot.name);
            for standing in ledger.status()? {
                println!("  {:<24} {:>6} points", standing.name, standing.points);
            }
            let rewards = ledger.list_rewards()?;
            println!("Rewards ({})", rewards.len());
            for reward in rewards {
                println!("  {:<12} {:<24} {:>6}p", reward.key, reward.name, reward.cost);
            }
        }
        Commands::SetWebhook { url } => {
            config.validate()?;
            let target = url
                .or_else(|| config.bot.webhook_url())
                .ok_or_else(|| anyhow!("No --url given and bot.hostname is not configured"))?;
            log::warn!("{}", WEBHOOK_POLLING_NOTICE);
            set_webhook(&config, &target).await?;
        }
        Commands::DeleteWebhook => {
            config.validate()?;
            delete_webhook(&config).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "telegram")]
async fn run_bot(config: Config) -> Result<()> {
    use chorebot::bot::{BotServer, Dispatcher, TelegramClient};
    use log::warn;

    info!("Starting Chorebot v{}", env!("CARGO_PKG_VERSION"));
    let store = SledRecordStore::open(config.storage.ledger_path())?;
    info!("Ledger opened at {}", config.storage.ledger_path().display());
    let client = TelegramClient::new(&config.bot);
    let mut dispatcher = Dispatcher::new(Ledger::new(store), config.bot.clone());
    match client.get_me().await {
        Ok(Some(handle)) => {
            info!("Connected as @{}", handle);
            dispatcher.set_bot_username(&handle);
        }
        Ok(None) => warn!("Bot API returned no username for this bot"),
        Err(e) => warn!("getMe failed: {} (continuing)", e),
    }
    // getUpdates is refused while a webhook is registered.
    if let Err(e) = client.delete_webhook().await {
        warn!("deleteWebhook failed: {} (polling may be rejected)", e);
    }
    let mut server = BotServer::new(dispatcher, client);
    server.run().await
}

#[cfg(feature = "telegram")]
async fn set_webhook(config: &Config, url: &str) -> Result<()> {
    let client = chorebot::bot::TelegramClient::new(&config.bot);
    let accepted = client.set_webhook(url).await?;
    println!("{}", serde_json::json!({ "ok": accepted, "url": url }));
    Ok(())
}

#[cfg(feature = "telegram")]
async fn delete_webhook(config: &Config) -> Result<()> {
    let client = chorebot::bot::TelegramClient::new(&config.bot);
    let removed = client.delete_webhook().await?;
    println!("{}", serde_json::json!({ "ok": removed }));
    Ok(())
}

#[cfg(not(feature = "telegram"))]
async fn run_bot(_config: Config) -> Result<()> {
    Err(anyhow!("The bot requires the 'telegram' feature"))
}

#[cfg(not(feature = "telegram"))]
async fn set_webhook(_config: &Config, _url: &str) -> Result<()> {
    Err(anyhow!("Webhook management requires the 'telegram' feature"))
}

#[cfg(not(feature = "telegram"))]
async fn delete_webhook(_config: &Config) -> Result<()> {
    Err(anyhow!("Webhook management requires the 'telegram' feature"))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise use the configured level.
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // Dependency chatter stays at warn unless tracing.
    if verbosity < 2 {
        for noisy in ["sled", "reqwest", "hyper"] {
            builder.filter_module(noisy, log::LevelFilter::Warn);
        }
    }

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    let security_path = config.as_ref().and_then(|c| c.logging.security_file.clone());

    match log_file {
        Some(f) => {
            let file = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Foreground runs also echo to the console.
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
