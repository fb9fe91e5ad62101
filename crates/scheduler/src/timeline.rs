use pileconfig::FadeCurve;
use serde::Serialize;

fn sample_curve(curve: FadeCurve, t: f64) -> f32 {
    let clamped = t.clamp(0.0, 1.0) as f32;
    match curve {
        FadeCurve::Linear => clamped,
        FadeCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
        FadeCurve::EaseInOut => {
            if clamped < 0.5 {
                2.0 * clamped * clamped
            } else {
                -1.0 + (4.0 - 2.0 * clamped) * clamped
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    FadeIn,
    FadeOut,
}

impl TransitionKind {
    fn target_alpha(self) -> f32 {
        match self {
            TransitionKind::FadeIn => 1.0,
            TransitionKind::FadeOut => 0.0,
        }
    }
}

/// A fade pinned to an absolute playback time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub at: f64,
    pub kind: TransitionKind,
    pub duration: f64,
}

impl Transition {
    fn progress(&self, time: f64) -> f64 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (time - self.at) / self.duration
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityState {
    Invisible,
    FadingIn,
    Visible,
    FadingOut,
    Retired,
}

/// Ordered fades for one entity, evaluated against the playback clock.
///
/// The state at any `now` depends only on the scheduled events, never on when
/// or how often `advance` ran. `Retired` is terminal.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Vec<Transition>,
    curve: FadeCurve,
    grace: f64,
    state: VisibilityState,
    alpha: f32,
}

impl Timeline {
    pub fn new(curve: FadeCurve, grace: f64) -> Self {
        Self {
            events: Vec::new(),
            curve,
            grace: grace.max(0.0),
            state: VisibilityState::Invisible,
            alpha: 0.0,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        let slot = self.events.partition_point(|event| event.at <= transition.at);
        self.events.insert(slot, transition);
    }

    pub fn events(&self) -> &[Transition] {
        &self.events
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Applies every event due at `now`; returns the new state when it changed.
    pub fn advance(&mut self, now: f64) -> Option<VisibilityState> {
        if self.state == VisibilityState::Retired {
            return None;
        }
        let (state, alpha) = self.evaluate(now);
        self.alpha = alpha;
        if state == self.state {
            None
        } else {
            self.state = state;
            Some(state)
        }
    }

    /// State and alpha at `now`, independent of previous calls.
    pub fn evaluate(&self, now: f64) -> (VisibilityState, f32) {
        let mut state = VisibilityState::Invisible;
        let mut alpha = 0.0_f32;
        for (index, event) in self.events.iter().enumerate() {
            if event.at > now {
                break;
            }
            let horizon = match self.events.get(index + 1) {
                Some(next) if next.at <= now => next.at,
                _ => now,
            };
            let progress = event.progress(horizon);
            let target = event.kind.target_alpha();
            alpha += (target - alpha) * sample_curve(self.curve, progress);
            state = match event.kind {
                TransitionKind::FadeIn if progress < 1.0 => VisibilityState::FadingIn,
                TransitionKind::FadeIn => VisibilityState::Visible,
                TransitionKind::FadeOut
                    if horizon >= event.at + event.duration.max(0.0) + self.grace =>
                {
                    VisibilityState::Retired
                }
                TransitionKind::FadeOut => VisibilityState::FadingOut,
            };
        }
        (state, alpha)
    }
}
