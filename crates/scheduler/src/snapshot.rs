use pileconfig::PileConfig;
use serde::Serialize;

use crate::batch::Batch;
use crate::object::TimedObject;
use crate::visual::{build_proxies, Proxy, VisualFactory};

/// Area covered by a snapshot's cached image, in playfield units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Snapshots never mask their children.
    pub masking: bool,
}

impl Bounds {
    pub fn playfield(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            masking: false,
        }
    }

    /// Grows the bounds by `factor` about their centre.
    pub fn oversized(self, factor: f32) -> Self {
        let width = self.width * factor;
        let height = self.height * factor;
        Self {
            x: self.x - (width - self.width) / 2.0,
            y: self.y - (height - self.height) / 2.0,
            width,
            height,
            masking: false,
        }
    }

    pub fn from_config(config: &PileConfig) -> Self {
        let snapshot = &config.snapshot;
        Self::playfield(snapshot.playfield_width, snapshot.playfield_height)
            .oversized(snapshot.oversize)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("failed to capture snapshot content: {0}")]
    Capture(String),
    #[error("failed to clear snapshot buffer: {0}")]
    Release(String),
}

/// Frame-buffered drawable supplied by the renderer.
///
/// A canvas keeps whatever it captured until `clear` is called.
pub trait Canvas {
    fn capture(&mut self, proxies: &[Proxy], clock: f64) -> Result<(), CanvasError>;
    fn set_alpha(&mut self, alpha: f32);
    fn clear(&mut self) -> Result<(), CanvasError>;
}

pub trait CanvasFactory {
    type Canvas: Canvas;

    fn create(&mut self, batch_index: usize, bounds: Bounds) -> Self::Canvas;
}

/// Clock value at which the first object of a batch is fully shown.
pub fn frozen_clock(first: &TimedObject) -> f64 {
    first.start_time - first.preempt + first.fade_in
}

/// Proxies for one batch, ready to be attached to a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSnapshot {
    pub batch_index: usize,
    pub frozen_clock: f64,
    pub proxies: Vec<Proxy>,
    pub skipped: usize,
}

pub fn prepare(batch: &Batch, visuals: &dyn VisualFactory) -> PreparedSnapshot {
    prepare_objects(batch.index(), batch.objects(), visuals)
}

pub(crate) fn prepare_objects(
    batch_index: usize,
    objects: &[TimedObject],
    visuals: &dyn VisualFactory,
) -> PreparedSnapshot {
    let (proxies, skipped) = build_proxies(objects, visuals);
    if skipped > 0 {
        tracing::trace!(
            batch = batch_index,
            skipped,
            "objects without a visual left out of snapshot"
        );
    }
    PreparedSnapshot {
        batch_index,
        frozen_clock: objects.first().map_or(0.0, frozen_clock),
        proxies,
        skipped,
    }
}

/// Cached image of one batch, captured at most once.
pub struct Snapshot<C: Canvas> {
    batch_index: usize,
    frozen_clock: f64,
    bounds: Bounds,
    proxies: Vec<Proxy>,
    canvas: C,
    captured: bool,
    released: bool,
    render_passes: u32,
}

impl<C: Canvas> Snapshot<C> {
    pub fn attach(prepared: PreparedSnapshot, canvas: C, bounds: Bounds) -> Self {
        Self {
            batch_index: prepared.batch_index,
            frozen_clock: prepared.frozen_clock,
            bounds,
            proxies: prepared.proxies,
            canvas,
            captured: false,
            released: false,
            render_passes: 0,
        }
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn frozen_clock(&self) -> f64 {
        self.frozen_clock
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn render_passes(&self) -> u32 {
        self.render_passes
    }

    /// Proxies still held; empty once the capture has happened.
    pub fn pending_proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Captures the batch on the first call and drops the proxies afterwards.
    ///
    /// Returns whether a render pass happened.
    pub fn update(&mut self) -> Result<bool, CanvasError> {
        if self.captured || self.released {
            return Ok(false);
        }
        self.canvas.capture(&self.proxies, self.frozen_clock)?;
        self.captured = true;
        self.render_passes += 1;
        self.proxies = Vec::new();
        Ok(true)
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        if !self.released {
            self.canvas.set_alpha(alpha);
        }
    }

    /// Clears the cached buffer. Safe to call repeatedly.
    pub fn release(&mut self) -> Result<(), CanvasError> {
        if self.released {
            return Ok(());
        }
        self.canvas.clear()?;
        self.released = true;
        self.proxies = Vec::new();
        Ok(())
    }
}
