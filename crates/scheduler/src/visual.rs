use serde::Serialize;

use crate::object::{ObjectKind, Position, TimedObject};

/// Drawable shape a proxy stands for inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualKind {
    HitCircle,
    SliderBody,
    SliderHeadCircle,
    SliderRepeatArrow,
    SliderTailCircle,
    SpinnerDisc,
}

/// Throwaway drawable built only to be captured into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proxy {
    pub kind: VisualKind,
    pub position: Position,
    pub start_time: f64,
    pub depth: usize,
}

/// Maps objects to the drawable that represents them, if any.
pub trait VisualFactory: Send + Sync {
    fn visual_for(&self, object: &TimedObject) -> Option<VisualKind>;
}

/// Standard mapping for the built-in object kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVisuals;

impl VisualFactory for DefaultVisuals {
    fn visual_for(&self, object: &TimedObject) -> Option<VisualKind> {
        match object.kind {
            ObjectKind::Circle => Some(VisualKind::HitCircle),
            ObjectKind::Slider => Some(VisualKind::SliderBody),
            ObjectKind::SliderHead => Some(VisualKind::SliderHeadCircle),
            ObjectKind::SliderRepeat => Some(VisualKind::SliderRepeatArrow),
            ObjectKind::SliderTail => Some(VisualKind::SliderTailCircle),
            ObjectKind::Spinner => Some(VisualKind::SpinnerDisc),
            ObjectKind::SliderTick | ObjectKind::Unknown => None,
        }
    }
}

/// Builds proxies for every renderable object in `objects`, nested parts included.
///
/// Returns the proxies and the number of objects skipped for lack of a visual.
pub fn build_proxies(objects: &[TimedObject], visuals: &dyn VisualFactory) -> (Vec<Proxy>, usize) {
    let mut proxies = Vec::new();
    let mut skipped = 0;
    for object in objects {
        object.walk(&mut |node, depth| match visuals.visual_for(node) {
            Some(kind) => proxies.push(Proxy {
                kind,
                position: node.position,
                start_time: node.start_time,
                depth,
            }),
            None => skipped += 1,
        });
    }
    (proxies, skipped)
}
