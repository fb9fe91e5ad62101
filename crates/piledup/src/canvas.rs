use scheduler::{Bounds, Canvas, CanvasError, CanvasFactory, Proxy};

/// Canvas that records what a renderer would have drawn.
#[derive(Debug)]
pub struct TraceCanvas {
    batch: usize,
    bounds: Bounds,
    alpha: f32,
    captured: usize,
}

impl TraceCanvas {
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Canvas for TraceCanvas {
    fn capture(&mut self, proxies: &[Proxy], clock: f64) -> Result<(), CanvasError> {
        self.captured = proxies.len();
        tracing::info!(
            batch = self.batch,
            proxies = proxies.len(),
            clock,
            width = self.bounds.width,
            height = self.bounds.height,
            "captured snapshot"
        );
        Ok(())
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    fn clear(&mut self) -> Result<(), CanvasError> {
        tracing::debug!(batch = self.batch, proxies = self.captured, "cleared snapshot buffer");
        self.captured = 0;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TraceFactory;

impl CanvasFactory for TraceFactory {
    type Canvas = TraceCanvas;

    fn create(&mut self, batch_index: usize, bounds: Bounds) -> TraceCanvas {
        TraceCanvas {
            batch: batch_index,
            bounds,
            alpha: 0.0,
            captured: 0,
        }
    }
}
