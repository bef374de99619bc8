//! Background load controller: decides when to open a new artwork, decodes
//! it off the render thread, and hands the result over. One decode is in
//! flight at a time; a newer request supersedes an older one, and stale
//! results are discarded by path identity rather than preempted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use winit::event_loop::EventLoopProxy;

use crate::error::Error;
use crate::events::{ControlEvent, RendererCommand, UserEvent};
use crate::region::RegionSource;
use crate::tasks::debounce::Debounce;
use crate::tasks::source::{ArtworkDescriptor, ArtworkSource};

pub struct ControllerOptions {
    pub advance_interval: Duration,
    pub settings_debounce: Duration,
}

struct Controller {
    source: Box<dyn ArtworkSource>,
    to_renderer: Sender<RendererCommand>,
    /// Nudges the render thread to drain the command channel.
    wake: Box<dyn Fn() + Send>,
    /// Path of the newest request; decode results for anything else are
    /// stale and dropped.
    latest: Option<ArtworkDescriptor>,
    /// Request produced while a decode was still in flight (latest wins).
    pending: Option<ArtworkDescriptor>,
}

impl Controller {
    fn send(&self, command: RendererCommand) {
        if self.to_renderer.send(command).is_err() {
            debug!("render thread gone; dropping command");
            return;
        }
        (self.wake)();
    }

    fn request(&mut self, force_reload: bool, decodes: &mut JoinSet<DecodeResult>) {
        match self.source.produce_next(force_reload) {
            Ok(Some(descriptor)) => {
                self.latest = Some(descriptor.clone());
                if decodes.is_empty() {
                    spawn_decode(decodes, descriptor);
                } else {
                    // A decode is running; remember only the newest ask.
                    self.pending = Some(descriptor);
                }
            }
            Ok(None) => debug!("artwork source has nothing to offer"),
            Err(err) => warn!("artwork source failed: {err:#}"),
        }
    }

    fn on_decode_done(
        &mut self,
        path: PathBuf,
        result: Result<RegionSource, Error>,
        decodes: &mut JoinSet<DecodeResult>,
    ) {
        let is_latest = self
            .latest
            .as_ref()
            .is_some_and(|descriptor| descriptor.path == path);
        if !is_latest {
            debug!(path = %path.display(), "discarding stale decode result");
        } else {
            match result {
                Ok(source) => {
                    info!(path = %path.display(), width = source.width(), height = source.height(), "artwork decoded");
                    self.send(RendererCommand::Consume(source));
                }
                // The previous artwork stays up on a failed open.
                Err(err) => warn!(path = %path.display(), "artwork decode failed: {err}"),
            }
        }
        if let Some(descriptor) = self.pending.take() {
            spawn_decode(decodes, descriptor);
        }
    }
}

type DecodeResult = (PathBuf, Result<RegionSource, Error>);

fn spawn_decode(decodes: &mut JoinSet<DecodeResult>, descriptor: ArtworkDescriptor) {
    let ArtworkDescriptor { path, rotation } = descriptor;
    decodes.spawn_blocking(move || {
        let result = RegionSource::open(&path, rotation);
        (path, result)
    });
}

pub async fn run(
    source: Box<dyn ArtworkSource>,
    mut events: Receiver<ControlEvent>,
    to_renderer: Sender<RendererCommand>,
    wake: EventLoopProxy<UserEvent>,
    options: ControllerOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let mut controller = Controller {
        source,
        to_renderer,
        wake: Box::new(move || {
            let _ = wake.send_event(UserEvent::CommandsReady);
        }),
        latest: None,
        pending: None,
    };
    let mut decodes: JoinSet<DecodeResult> = JoinSet::new();
    let mut debounce = Debounce::new(options.settings_debounce);
    let mut advance = tokio::time::interval(options.advance_interval);
    advance.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        select! {
            _ = cancel.cancelled() => break,

            // The first tick fires immediately and brings up the first
            // artwork; later ticks advance the rotation.
            _ = advance.tick() => controller.request(false, &mut decodes),

            // Settings settled down: rebuild the current artwork once.
            _ = debounce.fired() => {
                debug!("settings quiet period elapsed; reloading current artwork");
                controller.request(true, &mut decodes);
            }

            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                match event {
                    ControlEvent::AmountsChanged(amounts) => {
                        // The renderer picks the new amounts up right away;
                        // the expensive reload is debounced.
                        controller.send(RendererCommand::SetAmounts(amounts));
                        debounce.arm();
                    }
                    ControlEvent::ArtworkArrived => {
                        if let Err(err) = controller.source.refresh() {
                            warn!("library refresh failed: {err:#}");
                        }
                        controller.request(false, &mut decodes);
                    }
                    ControlEvent::NextArtwork => controller.request(false, &mut decodes),
                    ControlEvent::LockStateChanged(locked) => {
                        // The lock screen shows the artwork in focus.
                        controller.send(RendererCommand::SetBlurred {
                            blurred: !locked,
                            focus: false,
                        });
                    }
                    ControlEvent::DetailViewOpened => {
                        controller.send(RendererCommand::SetBlurred {
                            blurred: false,
                            focus: true,
                        });
                    }
                    ControlEvent::DetailViewClosed => {
                        controller.send(RendererCommand::SetBlurred {
                            blurred: true,
                            focus: true,
                        });
                    }
                }
            }

            Some(joined) = decodes.join_next(), if !decodes.is_empty() => {
                match joined {
                    Ok((path, result)) => controller.on_decode_done(path, result, &mut decodes),
                    Err(err) => warn!("decode task panicked: {err}"),
                }
            }
        }
    }
    info!("load controller shutting down");
    Ok(())
}
