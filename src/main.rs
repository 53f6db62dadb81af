//! Heads/Tails Betting Bot
//!
//! Runs betting rounds over Telegram with manual payment approval.

use clap::{Parser, Subcommand};
use coinflip_bot::{
    config::Config,
    monitor::start_dashboard,
    notify::Messenger,
    round::RoundEngine,
    storage::{Database, MemoryStore, Store},
    telegram::{CommandHandler, InboundEvent, TelegramBot, TelegramClient},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinflip-bot")]
#[command(about = "Round-based heads/tails betting bot for Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Keep all state in memory (nothing survives a restart)
        #[arg(long)]
        memory: bool,
    },
    /// Print the persisted round state
    Status,
    /// Send a test message to the operator
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { memory } => run_bot(config, memory).await,
        Commands::Status => show_status(config).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn open_store(config: &Config, memory: bool) -> anyhow::Result<Arc<dyn Store>> {
    if memory {
        tracing::warn!("Running with in-memory storage, state is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = config.database_path()?;
    Ok(Arc::new(Database::connect(&path).await?))
}

async fn run_bot(config: Config, memory: bool) -> anyhow::Result<()> {
    tracing::info!(operator_id = config.telegram.operator_id, "Starting coin-flip betting bot");

    let store = open_store(&config, memory).await?;
    let client = TelegramClient::new(&config.telegram.bot_token);
    let messenger: Arc<dyn Messenger> = Arc::new(client.clone());
    let engine = Arc::new(RoundEngine::from_config(&config, store, messenger.clone()));
    let handler = CommandHandler::new(engine.clone(), messenger);

    // Create command channel
    let (event_tx, mut event_rx) = mpsc::channel::<InboundEvent>(100);

    let telegram_bot = Arc::new(TelegramBot::new(client, config.telegram.poll_timeout_secs, event_tx));
    let poller = tokio::spawn(telegram_bot.start_polling());
    tracing::info!("Telegram command listener started");

    if let Some(dashboard) = &config.dashboard {
        let engine = engine.clone();
        let port = dashboard.port;
        tokio::spawn(async move {
            if let Err(e) = start_dashboard(engine, port).await {
                tracing::error!("Dashboard server error: {}", e);
            }
        });
    }

    let settings = engine.settings().await?;
    tracing::info!(
        betting_open = settings.betting_open,
        available_slots = settings.available_slots,
        total_slots = settings.total_slots,
        "Round state loaded"
    );

    // Events are handled one at a time
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => handler.handle(event).await,
                None => {
                    tracing::warn!("Telegram listener stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    poller.abort();
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database_path()?).await?;
    let engine = RoundEngine::new(
        Arc::new(db),
        Arc::new(TelegramClient::new(&config.telegram.bot_token)),
        config.telegram.operator_id,
        config.round.default_total_slots,
    );
    let snapshot = engine.snapshot().await?;
    let settings = &snapshot.settings;

    println!("\n🎲 Round Status\n");
    println!("Betting: {}", if settings.betting_open { "OPEN" } else { "CLOSED" });
    println!("Slots: {}/{} available", settings.available_slots, settings.total_slots);
    println!(
        "Next round: {}",
        settings.next_betting_time.as_deref().unwrap_or("not scheduled")
    );
    println!(
        "Announcement: {}",
        settings.result_announcement_time.as_deref().unwrap_or("not set")
    );
    println!(
        "Users: {} registered, {} bets, {} pending, {} approved",
        snapshot.registered_users, snapshot.bets_placed, snapshot.pending, snapshot.approved
    );
    println!(
        "Results: HEADS {} / TAILS {}",
        snapshot.tally.heads_wins, snapshot.tally.tails_wins
    );
    if let Some(side) = snapshot.winners.declared_side {
        println!("Winners on {}: {:?}", side, snapshot.winners.user_ids);
    }

    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let client = TelegramClient::new(&config.telegram.bot_token);
    client
        .send_text(
            config.telegram.operator_id,
            "🧪 <b>Test Notification</b>\n\nIf you see this, Telegram integration is working!",
        )
        .await?;

    println!("✅ Test notification sent!");
    Ok(())
}
