use serde::Serialize;

use scheduler::{Bounds, CanvasFactory, Scheduler, SnapshotHandle, SnapshotWindow, SyncTarget};

#[derive(Debug, Serialize)]
pub struct Plan {
    pub first_start_time: f64,
    pub bounds: Bounds,
    pub batches: Vec<BatchPlan>,
}

#[derive(Debug, Serialize)]
pub struct BatchPlan {
    pub index: usize,
    pub target: SyncTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotWindow>,
    pub objects: Vec<ObjectTiming>,
}

#[derive(Debug, Serialize)]
pub struct ObjectTiming {
    pub start_time: f64,
    pub preempt: f64,
    pub reveal_time: f64,
    pub nested: usize,
}

impl Plan {
    pub fn from_scheduler<F: CanvasFactory>(scheduler: &Scheduler<F>) -> Self {
        let batches = scheduler
            .batches()
            .iter()
            .zip(scheduler.targets())
            .map(|(batch, target)| BatchPlan {
                index: batch.index(),
                target: *target,
                snapshot: scheduler.window(SnapshotHandle(batch.index())),
                objects: batch
                    .objects()
                    .iter()
                    .map(|object| ObjectTiming {
                        start_time: object.start_time,
                        preempt: object.preempt,
                        reveal_time: object.reveal_time(),
                        nested: object.tree_len() - 1,
                    })
                    .collect(),
            })
            .collect();

        Self {
            first_start_time: scheduler.first_start_time(),
            bounds: scheduler.bounds(),
            batches,
        }
    }
}
