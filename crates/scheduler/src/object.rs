use serde::{Deserialize, Serialize};

/// Playfield coordinates of an object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Closed set of hit-object kinds understood by the scheduler.
///
/// Nested slider parts are kinds of their own so that a visual factory can
/// decide per part whether it has a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Circle,
    Slider,
    Spinner,
    SliderHead,
    SliderTick,
    SliderRepeat,
    SliderTail,
    #[serde(other)]
    Unknown,
}

/// A hit object with absolute timing, possibly owning nested parts.
///
/// All times are milliseconds on the playback clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedObject {
    pub kind: ObjectKind,
    pub start_time: f64,
    pub preempt: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<TimedObject>,
}

impl TimedObject {
    pub fn new(kind: ObjectKind, start_time: f64, preempt: f64) -> Self {
        Self {
            kind,
            start_time,
            preempt,
            fade_in: 0.0,
            position: Position::default(),
            nested: Vec::new(),
        }
    }

    pub fn with_fade_in(mut self, fade_in: f64) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_nested(mut self, nested: Vec<TimedObject>) -> Self {
        self.nested = nested;
        self
    }

    /// Instant at which the object starts appearing.
    pub fn reveal_time(&self) -> f64 {
        self.start_time - self.preempt
    }

    /// Visits this object and every nested object, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TimedObject, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a TimedObject, usize)) {
        visit(self, depth);
        for child in &self.nested {
            child.walk_at(depth + 1, visit);
        }
    }

    /// Number of objects in this tree, including the root.
    pub fn tree_len(&self) -> usize {
        1 + self.nested.iter().map(TimedObject::tree_len).sum::<usize>()
    }

    /// Checks the timing invariants for this tree.
    pub fn validate(&self) -> Result<(), String> {
        let mut problem = None;
        self.walk(&mut |object, _| {
            if problem.is_some() {
                return;
            }
            if !object.start_time.is_finite() {
                problem = Some(format!("start_time {} is not finite", object.start_time));
            } else if !object.preempt.is_finite() || object.preempt < 0.0 {
                problem = Some(format!("preempt {} must be finite and >= 0", object.preempt));
            } else if !object.fade_in.is_finite() || object.fade_in < 0.0 {
                problem = Some(format!("fade_in {} must be finite and >= 0", object.fade_in));
            }
        });
        problem.map_or(Ok(()), Err)
    }
}
