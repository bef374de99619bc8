//! Detail-viewport registry: one externally supplied region-of-interest
//! rectangle per slot, blended into the pan/zoom viewport while the artwork
//! is in focus. Changes are published on an explicit channel so parallax
//! consumers can follow along.

use tokio::sync::watch;

use crate::events::ViewportChange;

/// Rectangle in normalized [0, 1] image coordinates, y growing downward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }
}

pub struct DetailViewports {
    rects: [RectF; 2],
    changes: watch::Sender<Option<ViewportChange>>,
}

impl DetailViewports {
    pub fn new(changes: watch::Sender<Option<ViewportChange>>) -> Self {
        Self {
            rects: [RectF::default(); 2],
            changes,
        }
    }

    pub fn get(&self, id: usize) -> RectF {
        self.rects[id & 1]
    }

    pub fn set(&mut self, id: usize, rect: RectF) {
        self.rects[id & 1] = rect;
        self.changes.send_replace(Some(ViewportChange { id: id & 1, rect }));
    }

    pub fn clear(&mut self, id: usize) {
        self.set(id, RectF::default());
    }

    pub fn clear_all(&mut self) {
        self.clear(0);
        self.clear(1);
    }

    /// Publishes the centered full-fit viewport for an artwork of the given
    /// aspect ratio on the given screen.
    pub fn set_default(&mut self, id: usize, bitmap_aspect: f32, screen_aspect: f32) {
        let rect = default_viewport(bitmap_aspect, screen_aspect);
        self.set(id, rect);
    }
}

/// Centered viewport showing as much of the artwork as fits the screen.
pub fn default_viewport(bitmap_aspect: f32, screen_aspect: f32) -> RectF {
    if bitmap_aspect > screen_aspect {
        let half = screen_aspect / bitmap_aspect / 2.0;
        RectF::new(0.5 - half, 0.0, 0.5 + half, 1.0)
    } else {
        let half = bitmap_aspect / screen_aspect / 2.0;
        RectF::new(0.0, 0.5 - half, 1.0, 0.5 + half)
    }
}
