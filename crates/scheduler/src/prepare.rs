use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::object::TimedObject;
use crate::snapshot::{prepare_objects, PreparedSnapshot};
use crate::visual::VisualFactory;

struct PrepareJob {
    batch_index: usize,
    objects: Vec<TimedObject>,
}

/// Builds snapshot proxies on a worker thread.
///
/// Results come back in submission order and are attached by the owner on its
/// own thread. The worker exits once the preparer is dropped.
pub(crate) struct BackgroundPreparer {
    jobs: Option<Sender<PrepareJob>>,
    results: Receiver<PreparedSnapshot>,
    pending: BTreeSet<usize>,
}

impl BackgroundPreparer {
    pub fn spawn(visuals: Arc<dyn VisualFactory>) -> Self {
        let (job_tx, job_rx) = unbounded::<PrepareJob>();
        let (result_tx, result_rx) = unbounded();

        thread::spawn(move || {
            for job in job_rx {
                let prepared = prepare_objects(job.batch_index, &job.objects, visuals.as_ref());
                if result_tx.send(prepared).is_err() {
                    break;
                }
            }
        });

        Self {
            jobs: Some(job_tx),
            results: result_rx,
            pending: BTreeSet::new(),
        }
    }

    /// Queues a batch; a batch already in flight is not queued twice.
    pub fn submit(&mut self, batch_index: usize, objects: Vec<TimedObject>) -> bool {
        let Some(jobs) = self.jobs.as_ref() else {
            return false;
        };
        if !self.pending.insert(batch_index) {
            return false;
        }
        if jobs.send(PrepareJob { batch_index, objects }).is_err() {
            tracing::warn!(batch = batch_index, "snapshot prepare worker is gone");
            self.pending.remove(&batch_index);
            return false;
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Results that are ready now, without blocking.
    pub fn drain(&mut self) -> Vec<PreparedSnapshot> {
        let ready: Vec<PreparedSnapshot> = self.results.try_iter().collect();
        for prepared in &ready {
            self.pending.remove(&prepared.batch_index);
        }
        ready
    }

    /// Blocks until every queued batch has been prepared.
    pub fn finish(&mut self) -> Vec<PreparedSnapshot> {
        let mut ready = Vec::with_capacity(self.pending.len());
        while !self.pending.is_empty() {
            match self.results.recv() {
                Ok(prepared) => {
                    self.pending.remove(&prepared.batch_index);
                    ready.push(prepared);
                }
                Err(_) => {
                    tracing::warn!(
                        outstanding = self.pending.len(),
                        "snapshot prepare worker stopped early"
                    );
                    self.pending.clear();
                }
            }
        }
        ready
    }

    pub fn shutdown(&mut self) {
        self.jobs = None;
        self.pending.clear();
    }
}
