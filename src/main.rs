//! Binary entrypoint for Mural.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info};
use tracing_subscriber::{EnvFilter, fmt};
use winit::event_loop::EventLoop;

use mural::events::{ControlEvent, Notifier, UserEvent};
use mural::tasks::controller::{self, ControllerOptions};
use mural::tasks::source::{ArtworkSource, FixedSource, LibrarySource, watch_library};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "mural", about = "Rotating blurred-artwork wallpaper renderer")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Show a single artwork file instead of rotating through the library
    #[arg(long, value_name = "IMAGE")]
    image: Option<PathBuf>,

    /// Demo mode: pinned amounts plus an automatic pan/focus sweep
    #[arg(long)]
    demo: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("mural={}", level).parse().unwrap())
        .add_directive("wgpu=warn".parse().unwrap())
        .add_directive("winit=warn".parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = mural::config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if cli.demo {
        cfg.demo_mode = true;
    }
    let cfg = cfg.validated().context("validating configuration")?;

    let source: Box<dyn ArtworkSource> = match &cli.image {
        Some(path) => Box::new(FixedSource::new(path.clone())),
        None => Box::new(LibrarySource::new(&cfg.artwork_library_path)?),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let cancel = CancellationToken::new();

    let (control_tx, control_rx) = tokio::sync::mpsc::channel::<ControlEvent>(16);
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (notifier, mut notifications) = Notifier::channel();

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("creating event loop")?;
    let proxy = event_loop.create_proxy();

    // Report new artwork landing in the library while we run.
    let _watcher = if cli.image.is_none() {
        Some(
            watch_library(&cfg.artwork_library_path, control_tx.clone())
                .context("watching artwork library")?,
        )
    } else {
        None
    };

    runtime.spawn(controller::run(
        source,
        control_rx,
        command_tx,
        proxy,
        ControllerOptions {
            advance_interval: cfg.advance_interval,
            settings_debounce: cfg.settings_debounce,
        },
        cancel.child_token(),
    ));

    // Surface the outbound notifications for external parallax consumers.
    let notification_cancel = cancel.child_token();
    runtime.spawn(async move {
        loop {
            tokio::select! {
                _ = notification_cancel.cancelled() => break,
                Ok(()) = notifications.viewport.changed() => {
                    if let Some(change) = *notifications.viewport.borrow_and_update() {
                        debug!(slot = change.id, left = change.rect.left, top = change.rect.top,
                            right = change.rect.right, bottom = change.rect.bottom, "viewport changed");
                    }
                }
                Ok(()) = notifications.switching.changed() => {
                    if let Some(switching) = *notifications.switching.borrow_and_update() {
                        info!(?switching, "switching photos");
                    }
                }
            }
        }
    });

    mural::app::run(event_loop, cfg, command_rx, control_tx, notifier)?;

    cancel.cancel();
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
