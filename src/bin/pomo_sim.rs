//! Headless simulation of one Pomo actor and its session timer.
//!
//! Usage: `pomo-sim [CONFIG]`. Without an argument the default config file is
//! used when present. Session state is restored (with the time spent away
//! subtracted) on start and persisted on Ctrl-C.
//!
//! Logs go to stderr and to a daily file under the pomo log directory.

use anyhow::Context;
use pomo::actor::sim::{Grid, SimAnimator, SimDialogue, SimNavigator};
use pomo::actor::{ActorContext, Point};
use pomo::session::{SessionEvent, SessionState, SessionStore, SessionTimer};
use pomo::{PomoActor, PomoConfig, SchedulerEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const PLAYER_LINES: [&str; 3] = [
    "Hi there!",
    "Oh! You found me.",
    "Let's keep\\nthe streak going!",
];

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file = tracing_appender::rolling::daily(pomo::app_dirs::logs_dir(), "pomo-sim.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pomo=info,info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

fn load_config() -> anyhow::Result<PomoConfig> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(PomoConfig::default_config_path);

    if explicit.is_none() && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(PomoConfig::default());
    }
    PomoConfig::from_file(&path).with_context(|| format!("loading {}", path.display()))
}

/// A small fenced garden with a few crop beds.
fn garden() -> Grid {
    [(4, 3), (5, 3), (10, 7), (11, 7), (11, 8)]
        .into_iter()
        .fold(Grid::new(16, 12), |grid, (x, y)| grid.block(x, y))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    let config = load_config()?;
    tracing::info!("pomo-sim starting");

    let ctx = ActorContext::new(
        Arc::new(SimNavigator::new(garden(), Point::new(8.0, 6.0), 1.5)),
        Arc::new(SimAnimator::new()),
        Arc::new(SimDialogue::new()),
    );
    let actor = PomoActor::new(ctx, config.clone()).spawn();

    let mut scheduler_events = actor.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = scheduler_events.recv().await {
            match event {
                SchedulerEvent::Started { task } => tracing::info!(%task, "pomo is busy"),
                SchedulerEvent::Failed { task, error } => {
                    tracing::warn!(%task, %error, "task failed");
                }
                SchedulerEvent::Finished { .. } | SchedulerEvent::Cancelled { .. } => {}
            }
        }
    });

    let shutdown = CancellationToken::new();
    let store = SessionStore::open(config.session.state_path())
        .context("opening session state")?;
    let mut timer = SessionTimer::new(&config.session, store);
    let mut session_events = timer.subscribe();
    let restored = timer.restore();
    let (session, session_task) = timer.spawn(shutdown.clone());

    tokio::spawn(async move {
        while let Ok(event) = session_events.recv().await {
            if let SessionEvent::Tick { remaining } = event {
                if remaining % 60 == 0 {
                    tracing::info!(minutes_left = remaining / 60, "session tick");
                }
            }
        }
    });

    let snapshot = session.snapshot().await?;
    if !restored || matches!(snapshot.state, SessionState::Stopped) {
        session.plan_from_config(&config.session, None).await?;
    }
    if session.snapshot().await?.state == SessionState::Initializing {
        session.start().await?;
    }

    // Play the part of the user: tap the actor now and then until Ctrl-C.
    let mut every = tokio::time::interval(Duration::from_secs(45));
    every.tick().await;
    let mut lines = PLAYER_LINES.iter().cycle();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("waiting for Ctrl-C")?;
                break;
            }
            _ = every.tick() => {
                if let Some(line) = lines.next() {
                    actor.interact(*line);
                }
            }
        }
    }
    tracing::info!("shutting down");

    shutdown.cancel();
    if let Err(e) = session_task.await {
        tracing::warn!("session timer ended abnormally: {e}");
    }
    actor.shutdown().await;

    tracing::info!("pomo-sim shut down cleanly");
    Ok(())
}
