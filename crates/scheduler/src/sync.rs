use serde::Serialize;

use crate::batch::Batch;
use crate::object::TimedObject;
use crate::SchedulerError;

/// Timing of the object that anchors a batch's reveal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncTarget {
    pub start_time: f64,
    pub preempt: f64,
}

impl SyncTarget {
    pub fn of(object: &TimedObject) -> Self {
        Self {
            start_time: object.start_time,
            preempt: object.preempt,
        }
    }

    pub fn reveal_time(&self) -> f64 {
        self.start_time - self.preempt
    }
}

fn check_counts(batch_size: usize, min_alive_count: usize) -> Result<(), SchedulerError> {
    if batch_size == 0 {
        return Err(SchedulerError::InvalidConfig(
            "batch size must be greater than zero".into(),
        ));
    }
    if min_alive_count == 0 || min_alive_count > batch_size {
        return Err(SchedulerError::InvalidConfig(format!(
            "min alive count {min_alive_count} must be within 1..={batch_size}"
        )));
    }
    Ok(())
}

/// Resolves the anchor for `batches[index]` from the current (unmutated) timings.
///
/// Batch 0 anchors to its own first object; every later batch anchors to
/// `batches[index - 1][batch_size - min_alive_count]`.
pub fn sync_target(
    batches: &[Batch],
    index: usize,
    batch_size: usize,
    min_alive_count: usize,
) -> Result<SyncTarget, SchedulerError> {
    check_counts(batch_size, min_alive_count)?;
    let batch = batches
        .get(index)
        .ok_or(SchedulerError::UnknownBatch(index))?;
    if index == 0 {
        return Ok(SyncTarget::of(batch.first()));
    }

    let offset = batch_size - min_alive_count;
    let previous = &batches[index - 1];
    previous
        .get(offset)
        .map(SyncTarget::of)
        .ok_or_else(|| {
            SchedulerError::InvalidConfig(format!(
                "batch {} holds {} objects; sync offset {offset} is out of range",
                index - 1,
                previous.len()
            ))
        })
}

/// Rewrites an object tree so it starts appearing with `target`.
///
/// Applying the same target twice leaves the tree unchanged.
pub fn apply_timing(object: &mut TimedObject, target: SyncTarget) {
    object.fade_in = 0.0;
    object.preempt = object.start_time - target.start_time + target.preempt;
    for child in &mut object.nested {
        apply_timing(child, target);
    }
}

/// Anchors every batch to its target, walking from the last batch to the first.
///
/// Each lookup reads the previous batch before that batch is rewritten, so the
/// walk order is load-bearing. Returns the target used for each batch.
pub fn synchronize(
    batches: &mut [Batch],
    batch_size: usize,
    min_alive_count: usize,
) -> Result<Vec<SyncTarget>, SchedulerError> {
    check_counts(batch_size, min_alive_count)?;

    let mut targets = Vec::with_capacity(batches.len());
    for index in (0..batches.len()).rev() {
        let target = sync_target(batches, index, batch_size, min_alive_count)?;
        for object in batches[index].objects_mut() {
            apply_timing(object, target);
        }
        tracing::trace!(
            batch = index,
            target_start = target.start_time,
            target_preempt = target.preempt,
            "synchronized batch"
        );
        targets.push(target);
    }
    targets.reverse();
    Ok(targets)
}

/// Reapplies targets recorded by [`synchronize`] to an already synchronized
/// sequence.
///
/// `synchronize` reads its anchors from the current timings, so running it a
/// second time would anchor to rewritten values. Reapplying the recorded
/// targets leaves a synchronized sequence unchanged.
pub fn resynchronize(batches: &mut [Batch], targets: &[SyncTarget]) -> Result<(), SchedulerError> {
    if targets.len() != batches.len() {
        return Err(SchedulerError::InvalidConfig(format!(
            "{} recorded targets for {} batches",
            targets.len(),
            batches.len()
        )));
    }
    for (batch, target) in batches.iter_mut().zip(targets) {
        for object in batch.objects_mut() {
            apply_timing(object, *target);
        }
    }
    Ok(())
}
