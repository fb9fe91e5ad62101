//! Time-windowed reveal scheduling for the "Piled Up" effect.
//!
//! Objects are grouped into fixed-size batches, each batch is re-timed to
//! start appearing when an object of the previous batch nears expiry, and every
//! batch after the first is shown early as a cached snapshot:
//! - `batch` partitions the ordered object list.
//! - `sync` rewrites preempt/fade-in timings, last batch first.
//! - `snapshot` prepares throwaway proxies and captures them once per batch
//!   into a renderer-supplied `Canvas`.
//! - `timeline` and `sequencer` pin fades to absolute playback times.
//! - `Scheduler` ties the pieces together and is driven by `tick`.

pub mod batch;
pub mod object;
mod prepare;
pub mod sequencer;
pub mod snapshot;
pub mod sync;
pub mod timeline;
pub mod visual;

use std::collections::BTreeMap;
use std::sync::Arc;

use pileconfig::{ConfigError, PileConfig, PrepareMode};

pub use batch::{batch, Batch};
pub use object::{ObjectKind, Position, TimedObject};
pub use sequencer::{
    first_start_time, schedule_transitions, snapshot_window, SequencerSettings, SnapshotWindow,
};
pub use snapshot::{
    frozen_clock, prepare, Bounds, Canvas, CanvasError, CanvasFactory, PreparedSnapshot, Snapshot,
};
pub use sync::{apply_timing, resynchronize, sync_target, synchronize, SyncTarget};
pub use timeline::{Timeline, Transition, TransitionKind, VisibilityState};
pub use visual::{build_proxies, DefaultVisuals, Proxy, VisualFactory, VisualKind};

use prepare::BackgroundPreparer;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no timed objects to schedule")]
    EmptyInput,
    #[error("object {index} has invalid timing: {reason}")]
    InvalidObject { index: usize, reason: String },
    #[error("batch {0} does not exist")]
    UnknownBatch(usize),
    #[error("batch {0} plays live and has no snapshot")]
    LiveBatch(usize),
}

/// Identifies a scheduled snapshot by the batch it stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotHandle(pub usize);

/// Visibility change reported by `Scheduler::tick`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEvent {
    pub handle: SnapshotHandle,
    pub state: VisibilityState,
    pub at: f64,
}

struct SnapshotEntry<C: Canvas> {
    window: SnapshotWindow,
    timeline: Timeline,
    snapshot: Option<Snapshot<C>>,
    retired: bool,
}

pub struct Scheduler<F: CanvasFactory> {
    batches: Vec<Batch>,
    targets: Vec<SyncTarget>,
    first_start_time: f64,
    settings: SequencerSettings,
    bounds: Bounds,
    mode: PrepareMode,
    factory: F,
    visuals: Arc<dyn VisualFactory>,
    preparer: Option<BackgroundPreparer>,
    entries: BTreeMap<SnapshotHandle, SnapshotEntry<F::Canvas>>,
    torn_down: bool,
}

impl<F: CanvasFactory> Scheduler<F> {
    /// Batches, synchronizes and schedules `objects`.
    ///
    /// Every batch after the first gets a snapshot with its fades pinned to the
    /// playback clock.
    pub fn new(
        objects: Vec<TimedObject>,
        config: &PileConfig,
        factory: F,
        visuals: Arc<dyn VisualFactory>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        if objects.is_empty() {
            return Err(SchedulerError::EmptyInput);
        }
        for (index, object) in objects.iter().enumerate() {
            object
                .validate()
                .map_err(|reason| SchedulerError::InvalidObject { index, reason })?;
        }

        let batch_size = config.batching.batch_size;
        let min_alive_count = config.batching.min_alive_count;
        let object_count = objects.len();

        let mut batches = batch(objects, batch_size)?;
        let targets = synchronize(&mut batches, batch_size, min_alive_count)?;
        let first_start_time = first_start_time(&batches).ok_or(SchedulerError::EmptyInput)?;

        let mut scheduler = Self {
            batches,
            targets,
            first_start_time,
            settings: SequencerSettings::from_config(config),
            bounds: Bounds::from_config(config),
            mode: config.prepare.mode,
            factory,
            visuals,
            preparer: None,
            entries: BTreeMap::new(),
            torn_down: false,
        };

        for index in 1..scheduler.batches.len() {
            let handle = scheduler.schedule_snapshot(index)?;
            let window = scheduler.entries[&handle].window;
            scheduler.schedule_transitions(handle, window.reveal_at, window.retire_at)?;
        }

        tracing::info!(
            objects = object_count,
            batches = scheduler.batches.len(),
            snapshots = scheduler.entries.len(),
            first_start = scheduler.first_start_time,
            mode = ?scheduler.mode,
            "scheduled piled-up sequence"
        );
        Ok(scheduler)
    }

    pub fn with_default_visuals(
        objects: Vec<TimedObject>,
        config: &PileConfig,
        factory: F,
    ) -> Result<Self, SchedulerError> {
        Self::new(objects, config, factory, Arc::new(DefaultVisuals))
    }

    /// Creates the snapshot for `batch_index`, preparing its proxies inline or
    /// on the background worker depending on the configured mode.
    pub fn schedule_snapshot(&mut self, batch_index: usize) -> Result<SnapshotHandle, SchedulerError> {
        if batch_index == 0 {
            return Err(SchedulerError::LiveBatch(0));
        }
        let window = snapshot_window(&self.batches, batch_index)
            .ok_or(SchedulerError::UnknownBatch(batch_index))?;
        let handle = SnapshotHandle(batch_index);
        if self.entries.contains_key(&handle) {
            return Ok(handle);
        }

        let snapshot = match self.mode {
            PrepareMode::Inline => {
                let prepared = prepare(&self.batches[batch_index], self.visuals.as_ref());
                Some(self.attach(prepared))
            }
            PrepareMode::Background => {
                let visuals = &self.visuals;
                let preparer = self
                    .preparer
                    .get_or_insert_with(|| BackgroundPreparer::spawn(Arc::clone(visuals)));
                preparer.submit(batch_index, self.batches[batch_index].objects().to_vec());
                None
            }
        };

        self.entries.insert(
            handle,
            SnapshotEntry {
                window,
                timeline: self.settings.timeline(),
                snapshot,
                retired: false,
            },
        );
        Ok(handle)
    }

    /// Pins the fade-in at `reveal_at` and the hand-off fade-out at `retire_at`.
    pub fn schedule_transitions(
        &mut self,
        handle: SnapshotHandle,
        reveal_at: f64,
        retire_at: f64,
    ) -> Result<(), SchedulerError> {
        let settings = self.settings;
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(SchedulerError::UnknownBatch(handle.0))?;
        schedule_transitions(&mut entry.timeline, reveal_at, retire_at, &settings);
        tracing::debug!(
            batch = handle.0,
            reveal_at,
            retire_at,
            "scheduled snapshot transitions"
        );
        Ok(())
    }

    fn attach(&mut self, prepared: PreparedSnapshot) -> Snapshot<F::Canvas> {
        let canvas = self.factory.create(prepared.batch_index, self.bounds);
        tracing::debug!(
            batch = prepared.batch_index,
            proxies = prepared.proxies.len(),
            skipped = prepared.skipped,
            "attached snapshot"
        );
        Snapshot::attach(prepared, canvas, self.bounds)
    }

    fn attach_ready(&mut self, ready: Vec<PreparedSnapshot>) {
        for prepared in ready {
            let handle = SnapshotHandle(prepared.batch_index);
            let wanted = self
                .entries
                .get(&handle)
                .is_some_and(|entry| entry.snapshot.is_none() && !entry.retired);
            if !wanted {
                continue;
            }
            let snapshot = self.attach(prepared);
            if let Some(entry) = self.entries.get_mut(&handle) {
                entry.snapshot = Some(snapshot);
            }
        }
    }

    /// Blocks until every background prepare has been attached.
    pub fn finish_prepares(&mut self) {
        let ready = match self.preparer.as_mut() {
            Some(preparer) => preparer.finish(),
            None => return,
        };
        self.attach_ready(ready);
    }

    pub fn pending_prepares(&self) -> usize {
        self.preparer.as_ref().map_or(0, BackgroundPreparer::pending)
    }

    /// Advances every snapshot to `now` on the playback clock.
    pub fn tick(&mut self, now: f64) -> Vec<SnapshotEvent> {
        if self.torn_down {
            return Vec::new();
        }
        if let Some(preparer) = self.preparer.as_mut() {
            let ready = preparer.drain();
            self.attach_ready(ready);
        }

        let mut events = Vec::new();
        for (handle, entry) in self.entries.iter_mut() {
            if entry.retired {
                continue;
            }

            if let Some(state) = entry.timeline.advance(now) {
                tracing::trace!(batch = handle.0, ?state, now, "snapshot visibility changed");
                events.push(SnapshotEvent {
                    handle: *handle,
                    state,
                    at: now,
                });
            }

            let state = entry.timeline.state();
            let Some(snapshot) = entry.snapshot.as_mut() else {
                continue;
            };

            if state != VisibilityState::Retired {
                if let Err(err) = snapshot.update() {
                    tracing::warn!(batch = handle.0, %err, "snapshot capture failed; retrying next frame");
                }
                snapshot.set_alpha(entry.timeline.alpha());
                continue;
            }

            match snapshot.release() {
                Ok(()) => {
                    entry.snapshot = None;
                    entry.retired = true;
                    tracing::debug!(batch = handle.0, now, "released retired snapshot");
                }
                Err(err) => {
                    tracing::warn!(batch = handle.0, %err, "snapshot release failed; retrying next frame");
                }
            }
        }

        // a snapshot whose prepare never landed has nothing left to release
        for entry in self.entries.values_mut() {
            if entry.snapshot.is_none() && entry.timeline.state() == VisibilityState::Retired {
                entry.retired = true;
            }
        }
        events
    }

    /// Clears every unreleased snapshot and drops all pending transitions.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(mut preparer) = self.preparer.take() {
            preparer.shutdown();
        }

        let mut failures = 0usize;
        for (handle, entry) in self.entries.iter_mut() {
            entry.timeline.clear();
            entry.retired = true;
            if let Some(mut snapshot) = entry.snapshot.take() {
                if let Err(err) = snapshot.release() {
                    failures += 1;
                    tracing::warn!(batch = handle.0, %err, "failed to clear snapshot during teardown");
                }
            }
        }
        tracing::debug!(
            snapshots = self.entries.len(),
            failures,
            "tore down piled-up sequence"
        );
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    /// Reapplies the targets recorded at construction; leaves the re-timed
    /// objects as they are.
    pub fn resynchronize(&mut self) -> Result<(), SchedulerError> {
        resynchronize(&mut self.batches, &self.targets)
    }

    pub fn first_start_time(&self) -> f64 {
        self.first_start_time
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// The re-timed objects, in source order, for the live playfield.
    pub fn objects(&self) -> impl Iterator<Item = &TimedObject> {
        self.batches.iter().flat_map(|batch| batch.objects().iter())
    }

    pub fn into_objects(mut self) -> Vec<TimedObject> {
        std::mem::take(&mut self.batches)
            .into_iter()
            .flat_map(Batch::into_objects)
            .collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = SnapshotHandle> + '_ {
        self.entries.keys().copied()
    }

    pub fn window(&self, handle: SnapshotHandle) -> Option<SnapshotWindow> {
        self.entries.get(&handle).map(|entry| entry.window)
    }

    pub fn visibility(&self, handle: SnapshotHandle) -> Option<VisibilityState> {
        self.entries.get(&handle).map(|entry| entry.timeline.state())
    }

    pub fn timeline(&self, handle: SnapshotHandle) -> Option<&Timeline> {
        self.entries.get(&handle).map(|entry| &entry.timeline)
    }

    pub fn snapshot(&self, handle: SnapshotHandle) -> Option<&Snapshot<F::Canvas>> {
        self.entries
            .get(&handle)
            .and_then(|entry| entry.snapshot.as_ref())
    }

    /// Live snapshots ordered back to front: later batches draw beneath earlier ones.
    pub fn snapshots_in_draw_order(&self) -> impl Iterator<Item = &Snapshot<F::Canvas>> {
        self.entries
            .values()
            .rev()
            .filter_map(|entry| entry.snapshot.as_ref())
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: CanvasFactory> Drop for Scheduler<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}
