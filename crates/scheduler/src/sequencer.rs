use pileconfig::{FadeCurve, PileConfig};
use serde::Serialize;

use crate::batch::Batch;
use crate::timeline::{Timeline, Transition, TransitionKind};

/// Fade timings shared by every snapshot of a sequence, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerSettings {
    pub reveal_duration: f64,
    pub retire_duration: f64,
    pub retire_grace: f64,
    pub curve: FadeCurve,
}

impl SequencerSettings {
    pub fn from_config(config: &PileConfig) -> Self {
        let transitions = &config.transitions;
        Self {
            reveal_duration: transitions.reveal_ms(),
            retire_duration: transitions.retire_ms(),
            retire_grace: transitions.grace_ms(),
            curve: transitions.curve,
        }
    }

    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.curve, self.retire_grace)
    }
}

/// When a batch's snapshot is shown and when it hands off to the live objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotWindow {
    pub batch_index: usize,
    pub reveal_at: f64,
    pub retire_at: f64,
}

/// Reveal instant of the very first object of the sequence.
pub fn first_start_time(batches: &[Batch]) -> Option<f64> {
    batches.first().map(|batch| batch.first().reveal_time())
}

/// Window for `batches[index]`; the first batch plays live and has none.
///
/// `retire_at` is the instant the fade-out is actually scheduled at.
pub fn snapshot_window(batches: &[Batch], index: usize) -> Option<SnapshotWindow> {
    if index == 0 {
        return None;
    }
    let reveal_at = first_start_time(batches)?;
    let batch = batches.get(index)?;
    Some(SnapshotWindow {
        batch_index: index,
        reveal_at,
        retire_at: hand_off_at(reveal_at, batch.first().reveal_time()),
    })
}

/// A retire instant earlier than the reveal is clamped to the reveal so the
/// snapshot never ends up fading in after its hand-off.
fn hand_off_at(reveal_at: f64, retire_at: f64) -> f64 {
    retire_at.max(reveal_at)
}

/// Pins the fade-in and fade-out of one snapshot onto its timeline,
/// replacing whatever was scheduled there before.
pub fn schedule_transitions(
    timeline: &mut Timeline,
    reveal_at: f64,
    retire_at: f64,
    settings: &SequencerSettings,
) {
    timeline.clear();
    timeline.push(Transition {
        at: reveal_at,
        kind: TransitionKind::FadeIn,
        duration: settings.reveal_duration,
    });
    timeline.push(Transition {
        at: hand_off_at(reveal_at, retire_at),
        kind: TransitionKind::FadeOut,
        duration: settings.retire_duration,
    });
}
