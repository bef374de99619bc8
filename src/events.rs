//! Events and commands flowing between the controller, the render thread,
//! and external collaborators. Explicit channels, no broadcast bus.

use tokio::sync::watch;

use crate::region::RegionSource;
use crate::render::viewport::RectF;

/// Blur/dim/grey settings, in the same integer ranges the settings store
/// uses (blur and grey 0..=500, dim 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amounts {
    pub blur: u32,
    pub dim: u32,
    pub grey: u32,
}

/// Inbound events from collaborators, consumed by the load controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    AmountsChanged(Amounts),
    /// New artwork landed in the library.
    ArtworkArrived,
    /// Advance to another artwork now.
    NextArtwork,
    LockStateChanged(bool),
    DetailViewOpened,
    DetailViewClosed,
}

/// Commands delivered to the render thread.
#[derive(Debug)]
pub enum RendererCommand {
    Consume(RegionSource),
    SetAmounts(Amounts),
    SetBlurred { blurred: bool, focus: bool },
}

/// Wake-up payload for the winit event loop proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    CommandsReady,
}

/// A slot's visible viewport changed, in normalized [0, 1] coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportChange {
    pub id: usize,
    pub rect: RectF,
}

/// Crossfade lifecycle, tagged with the slot being transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchingPhotos {
    InProgress(usize),
    Done(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkSize {
    pub width: u32,
    pub height: u32,
}

/// Outbound notification senders owned by the renderer side.
pub struct Notifier {
    pub switching: watch::Sender<Option<SwitchingPhotos>>,
    pub viewport: watch::Sender<Option<ViewportChange>>,
    pub artwork_size: watch::Sender<Option<ArtworkSize>>,
}

/// Receiver halves handed to external consumers (parallax sync and friends).
pub struct Notifications {
    pub switching: watch::Receiver<Option<SwitchingPhotos>>,
    pub viewport: watch::Receiver<Option<ViewportChange>>,
    pub artwork_size: watch::Receiver<Option<ArtworkSize>>,
}

impl Notifier {
    pub fn channel() -> (Self, Notifications) {
        let (switching_tx, switching_rx) = watch::channel(None);
        let (viewport_tx, viewport_rx) = watch::channel(None);
        let (size_tx, size_rx) = watch::channel(None);
        (
            Self {
                switching: switching_tx,
                viewport: viewport_tx,
                artwork_size: size_tx,
            },
            Notifications {
                switching: switching_rx,
                viewport: viewport_rx,
                artwork_size: size_rx,
            },
        )
    }
}
