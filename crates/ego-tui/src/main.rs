//! Ego - terminal front-end for a multimodal chat assistant
//!
//! Every backend capability is simulated; see `ego-core` for the session
//! state machine this binary drives.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ego_core::services::{ImageService, SearchService, VoiceService, VoiceSettings};
use ego_core::{
    Config, Delay, ModelCatalog, NoDelay, QuotaState, RandomDelay, SessionStore, SharedSession,
    SimulatedBackend, TurnController,
};
use tracing_subscriber::{fmt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui, TICK_RATE};

#[derive(Parser)]
#[command(name = "ego", version)]
#[command(about = "Terminal multimodal chat assistant with simulated backends")]
struct Args {
    /// Model id to start with (e.g. gpt-4, claude-3-opus)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Start with thinking mode on
    #[arg(long)]
    thinking: bool,

    /// Start with web search on
    #[arg(long)]
    web_search: bool,

    /// Weekly message quota for this run
    #[arg(long, env = "EGO_WEEKLY_QUOTA")]
    quota: Option<u32>,

    /// Skip all simulated latency
    #[arg(long)]
    no_delay: bool,
}

fn init_logging(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("ego.log"))
        .context("opening log file")?;

    // stderr belongs to the terminal UI, so logs go to a file
    let filter = EnvFilter::try_from_env("EGO_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = Config::config_dir().unwrap_or_else(|_| std::env::temp_dir().join("ego"));
    init_logging(&config_dir)?;

    let config_path = Config::path().ok();
    let config = match &config_path {
        Some(path) => Config::load_from(path).unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring unreadable config");
            Config::new()
        }),
        None => Config::new(),
    };

    // CLI args > config file > defaults
    let model_id = args.model.clone().or_else(|| config.default_model.clone());
    let model = match model_id {
        Some(id) => match ModelCatalog::find(&id) {
            Some(model) => Some(model),
            None => anyhow::bail!("unknown model '{}'", id),
        },
        None => None,
    };
    let mut customization = config.customization;
    if args.thinking {
        customization = customization.with_thinking_mode(true);
    }
    if args.web_search {
        customization = customization.with_web_search(true);
    }
    let weekly_quota = args.quota.unwrap_or(config.weekly_quota);

    let delay: Arc<dyn Delay> = if args.no_delay {
        Arc::new(NoDelay)
    } else {
        Arc::new(RandomDelay)
    };
    let search = Arc::new(SearchService::new(delay.clone()));
    let images = Arc::new(ImageService::new(delay.clone()));
    let voice = Arc::new(VoiceService::new(delay.clone(), VoiceSettings::default()));
    let backend = SimulatedBackend::new(delay.clone(), config.response_delay_ms)
        .with_search(search)
        .with_images(images);

    let mut store = SessionStore::with_customization(customization);
    store.set_selected_model(model);
    let controller = TurnController::new(
        SharedSession::new(store),
        QuotaState::new(weekly_quota, Utc::now()),
        Arc::new(backend),
    )
    .with_delay(delay)
    .with_timing(config.turn_timing());
    let controller = Arc::new(controller);

    tracing::info!(
        quota = weekly_quota,
        no_delay = args.no_delay,
        "starting ego"
    );

    let events = EventHandler::new(TICK_RATE, controller.subscribe());
    let mut app = App::new(controller, voice, config, config_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, events).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App, mut events: EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    app.controller.cancel();
    tracing::info!("exiting");
    Ok(())
}
