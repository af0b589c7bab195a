//! wtradar: battle log and chat radar binary.
//! Wires config, live identity, the reconciler supervisor, the presenter and
//! the telemetry source into one process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wtradar_daemon::config::{self, Config, LoadOutcome};
use wtradar_daemon::identity::{IdentityPublisher, live_identity};
use wtradar_daemon::presenter::{format_trophies, run_presenter};
use wtradar_daemon::source::{SourceError, SourceStats, pump_lines};
use wtradar_daemon::supervisor::{
    ReconcilerSupervisor, RedrawNotification, RedrawSink, feed_channels,
};

mod cli;

/// Redraws buffered for the presenter before it starts coalescing.
const REDRAW_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("WTRADAR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let config = match config::load_or_create(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
    {
        LoadOutcome::Loaded(config) => config,
        LoadOutcome::Created(path) => {
            tracing::info!(path = %path.display(), "wrote default config");
            eprintln!(
                "created {}; set player_name to your in-game name and run again",
                path.display()
            );
            return Ok(());
        }
    };

    match args.command {
        cli::Command::Config => {
            println!("# {}", config_path.display());
            println!("{}", config.dump());
        }
        cli::Command::Run(opts) => {
            tracing::info!(config = %config.dump(), "turning on radar");
            run(config, config_path, opts).await?;
        }
    }
    Ok(())
}

async fn run(config: Config, config_path: PathBuf, opts: cli::RunOpts) -> anyhow::Result<()> {
    let reader = open_input(opts.input.as_deref()).await?;
    let cancel = CancellationToken::new();

    let (publisher, identity) = live_identity(config.player_name);
    let (senders, receivers) = feed_channels(config.feed_buffer);

    let (redraw_tx, redraw_rx) = broadcast::channel(REDRAW_BUFFER);
    let sink: Arc<dyn RedrawSink> = Arc::new(move |n: RedrawNotification| {
        // No receiver only means the presenter already stopped.
        let _ = redraw_tx.send(n);
    });

    let supervisor = ReconcilerSupervisor::spawn(Arc::new(identity), receivers, sink, cancel.clone());
    let battle_log = supervisor.battle_log();
    let chat = supervisor.chat();

    let presenter = tokio::spawn(run_presenter(
        redraw_rx,
        battle_log.clone(),
        chat.clone(),
        opts.format,
        opts.feed,
        tokio::io::stdout(),
        cancel.clone(),
    ));
    let reload = spawn_reload(publisher, config_path, cancel.clone());
    let mut source = tokio::spawn(pump_lines(reader, senders, cancel.clone()));

    let finished = tokio::select! {
        () = shutdown_signal() => None,
        res = &mut source => Some(res),
    };
    let source_result = match finished {
        Some(res) => res,
        None => {
            supervisor.shutdown();
            source.await
        }
    };
    // Feeds drain either way; a transport failure is reported afterwards.
    let source_status = source_outcome(source_result.context("telemetry source task panicked")?);

    let exits = supervisor.join().await.context("feed task panicked")?;
    let consumed: u64 = exits.iter().map(|exit| exit.consumed).sum();
    tracing::info!(feeds = exits.len(), consumed, "all feeds finished");

    let last_battle = Arc::clone(&battle_log.borrow());
    tracing::info!(
        session = last_battle.session,
        kills = last_battle.trophies.total(),
        trophies = %format_trophies(&last_battle.trophies),
        messages = chat.borrow().len(),
        "final battle state"
    );

    match presenter.await.context("presenter task panicked")? {
        Ok(frames) => tracing::debug!(frames, "presenter drained"),
        Err(e) => tracing::warn!("presenter output failed: {e}"),
    }

    cancel.cancel();
    reload.await.ok();
    tracing::info!("radar off");
    source_status
}

/// Log the source's counters, or turn its failure into the process error.
fn source_outcome(result: Result<SourceStats, SourceError>) -> anyhow::Result<()> {
    match result {
        Ok(stats) => {
            tracing::info!(
                forwarded = stats.forwarded,
                rejected = stats.rejected,
                undelivered = stats.undelivered,
                "telemetry source finished"
            );
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("telemetry source failed")),
    }
}

async fn open_input(input: Option<&Path>) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening telemetry input {}", path.display()))?;
            tracing::info!(path = %path.display(), "reading telemetry from file");
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            tracing::info!("reading telemetry from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}

/// Re-read the config on SIGHUP and publish the player name.
#[cfg(unix)]
fn spawn_reload(publisher: IdentityPublisher, path: PathBuf, cancel: CancellationToken) -> JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("SIGHUP handler unavailable, config reload disabled: {e}");
                return;
            }
        };
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    match publisher.reload_from(&path) {
                        Ok(true) => tracing::info!(
                            player_name = %publisher.current(),
                            "config reloaded, player identity updated"
                        ),
                        Ok(false) => tracing::info!("config reloaded, player identity unchanged"),
                        Err(e) => tracing::warn!("config reload failed, keeping previous identity: {e}"),
                    }
                }
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_reload(publisher: IdentityPublisher, _path: PathBuf, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        drop(publisher);
    })
}
