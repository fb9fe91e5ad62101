use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pileconfig::{PileConfig, PrepareMode};
use scheduler::{
    Bounds, Canvas, CanvasError, CanvasFactory, DefaultVisuals, ObjectKind, Proxy, Scheduler,
    SchedulerError, SnapshotHandle, TimedObject, VisibilityState,
};

#[derive(Debug, Default)]
struct CanvasLog {
    created: Vec<usize>,
    captures: Vec<(usize, usize, f64)>,
    clears: Vec<usize>,
    failing_clears: u32,
}

struct RecordingCanvas {
    batch: usize,
    alpha: f32,
    log: Rc<RefCell<CanvasLog>>,
}

impl Canvas for RecordingCanvas {
    fn capture(&mut self, proxies: &[Proxy], clock: f64) -> Result<(), CanvasError> {
        self.log
            .borrow_mut()
            .captures
            .push((self.batch, proxies.len(), clock));
        Ok(())
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    fn clear(&mut self) -> Result<(), CanvasError> {
        let mut log = self.log.borrow_mut();
        if log.failing_clears > 0 {
            log.failing_clears -= 1;
            return Err(CanvasError::Release("renderer still flushing".into()));
        }
        log.clears.push(self.batch);
        Ok(())
    }
}

#[derive(Default, Clone)]
struct RecordingFactory {
    log: Rc<RefCell<CanvasLog>>,
}

impl CanvasFactory for RecordingFactory {
    type Canvas = RecordingCanvas;

    fn create(&mut self, batch_index: usize, bounds: Bounds) -> RecordingCanvas {
        assert!(!bounds.masking);
        self.log.borrow_mut().created.push(batch_index);
        RecordingCanvas {
            batch: batch_index,
            alpha: 0.0,
            log: Rc::clone(&self.log),
        }
    }
}

fn circles(count: usize) -> Vec<TimedObject> {
    (0..count)
        .map(|i| {
            TimedObject::new(ObjectKind::Circle, i as f64 * 100.0, 450.0)
                .with_fade_in(300.0)
                .with_position((i % 16) as f32 * 32.0, 192.0)
        })
        .collect()
}

fn config(batch_size: usize, min_alive_count: usize) -> PileConfig {
    let mut config = PileConfig::default();
    config.batching.batch_size = batch_size;
    config.batching.min_alive_count = min_alive_count;
    config
}

#[test]
fn fifty_objects_need_no_snapshot() {
    let factory = RecordingFactory::default();
    let scheduler =
        Scheduler::with_default_visuals(circles(50), &config(50, 10), factory.clone()).unwrap();
    assert_eq!(scheduler.batches().len(), 1);
    assert_eq!(scheduler.handles().count(), 0);
    assert!(factory.log.borrow().created.is_empty());
}

#[test]
fn hundred_objects_hand_off_at_object_forty() {
    let natural = circles(100);
    let anchor = natural[40].clone();
    let factory = RecordingFactory::default();
    let scheduler =
        Scheduler::with_default_visuals(natural.clone(), &config(50, 10), factory.clone())
            .unwrap();

    assert_eq!(scheduler.batches().len(), 2);
    assert_eq!(scheduler.handles().collect::<Vec<_>>(), vec![SnapshotHandle(1)]);
    assert!(scheduler.snapshot(SnapshotHandle(0)).is_none());

    for object in scheduler.batches()[1].objects() {
        let expected = object.start_time - anchor.start_time + anchor.preempt;
        assert!((object.preempt - expected).abs() < 1e-9);
        assert_eq!(object.fade_in, 0.0);
    }

    let window = scheduler.window(SnapshotHandle(1)).unwrap();
    assert_eq!(window.reveal_at, -450.0);
    assert!((window.retire_at - (anchor.start_time - anchor.preempt)).abs() < 1e-9);

    let rewritten = scheduler.into_objects();
    assert_eq!(rewritten.len(), 100);
    let starts: Vec<f64> = rewritten.iter().map(|o| o.start_time).collect();
    let natural_starts: Vec<f64> = natural.iter().map(|o| o.start_time).collect();
    assert_eq!(starts, natural_starts);
}

#[test]
fn capture_happens_once_over_many_ticks() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(30), &config(10, 3), factory.clone()).unwrap();

    let mut now = -500.0;
    for _ in 0..100 {
        scheduler.tick(now);
        now += 1.0;
    }

    let log = factory.log.borrow();
    assert_eq!(log.created, vec![1, 2]);
    assert_eq!(log.captures.len(), 2);
    for handle in [SnapshotHandle(1), SnapshotHandle(2)] {
        assert_eq!(scheduler.snapshot(handle).unwrap().render_passes(), 1);
    }
    // captured with the clock frozen at the first object's reveal
    let (_, proxies, clock) = log.captures[0];
    assert_eq!(proxies, 10);
    let first = &scheduler.batches()[1].objects()[0];
    assert!((clock - first.reveal_time()).abs() < 1e-9);
}

#[test]
fn snapshots_walk_through_every_state_and_release() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(20), &config(10, 3), factory.clone()).unwrap();
    let handle = SnapshotHandle(1);
    let window = scheduler.window(handle).unwrap();

    let mut seen = Vec::new();
    let mut now = window.reveal_at - 32.0;
    while now < window.retire_at + 1000.0 {
        for event in scheduler.tick(now) {
            assert_eq!(event.handle, handle);
            seen.push(event.state);
        }
        now += 8.0;
    }

    assert_eq!(
        seen,
        vec![
            VisibilityState::FadingIn,
            VisibilityState::Visible,
            VisibilityState::FadingOut,
            VisibilityState::Retired,
        ]
    );
    assert!(scheduler.snapshot(handle).is_none());
    assert_eq!(factory.log.borrow().clears, vec![1]);
}

#[test]
fn rescheduling_later_keeps_the_snapshot_visible() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(20), &config(10, 3), factory.clone()).unwrap();
    let handle = SnapshotHandle(1);
    let window = scheduler.window(handle).unwrap();

    scheduler
        .schedule_transitions(handle, window.reveal_at, window.retire_at + 5000.0)
        .unwrap();
    assert_eq!(scheduler.timeline(handle).unwrap().events().len(), 2);

    scheduler.tick(window.retire_at + 1000.0);
    assert_eq!(scheduler.visibility(handle), Some(VisibilityState::Visible));
    assert!(factory.log.borrow().clears.is_empty());

    scheduler.tick(window.retire_at + 6000.0);
    assert_eq!(scheduler.visibility(handle), Some(VisibilityState::Retired));
}

#[test]
fn resynchronizing_keeps_the_re_timed_objects() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(20), &config(10, 3), factory).unwrap();
    let once: Vec<TimedObject> = scheduler.objects().cloned().collect();

    scheduler.resynchronize().unwrap();
    let twice: Vec<TimedObject> = scheduler.objects().cloned().collect();
    assert_eq!(twice, once);
    assert!((twice[10].preempt - 750.0).abs() < 1e-9);
}

#[test]
fn jumping_the_clock_lands_in_the_same_state() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(40), &config(10, 3), factory).unwrap();
    let window = scheduler.window(SnapshotHandle(3)).unwrap();
    scheduler.tick(window.retire_at + 10.0);
    assert_eq!(
        scheduler.visibility(SnapshotHandle(3)),
        Some(VisibilityState::FadingOut)
    );
    assert_eq!(
        scheduler.visibility(SnapshotHandle(1)),
        Some(VisibilityState::Retired)
    );
}

#[test]
fn failed_release_is_retried_next_frame() {
    let factory = RecordingFactory::default();
    factory.log.borrow_mut().failing_clears = 1;
    let mut scheduler =
        Scheduler::with_default_visuals(circles(20), &config(10, 3), factory.clone()).unwrap();
    let window = scheduler.window(SnapshotHandle(1)).unwrap();

    scheduler.tick(window.reveal_at);
    scheduler.tick(window.retire_at + 5000.0);
    assert!(scheduler.snapshot(SnapshotHandle(1)).is_some());
    assert!(factory.log.borrow().clears.is_empty());

    scheduler.tick(window.retire_at + 5016.0);
    assert!(scheduler.snapshot(SnapshotHandle(1)).is_none());
    assert_eq!(factory.log.borrow().clears, vec![1]);
}

#[test]
fn teardown_releases_everything_once() {
    let factory = RecordingFactory::default();
    {
        let mut scheduler =
            Scheduler::with_default_visuals(circles(50), &config(10, 3), factory.clone()).unwrap();
        scheduler.tick(0.0);
        scheduler.teardown();
        assert!(scheduler.tick(100_000.0).is_empty());
        assert_eq!(scheduler.snapshots_in_draw_order().count(), 0);
    }
    let mut clears = factory.log.borrow().clears.clone();
    clears.sort_unstable();
    assert_eq!(clears, vec![1, 2, 3, 4]);
}

#[test]
fn dropping_the_scheduler_releases_buffers() {
    let factory = RecordingFactory::default();
    let scheduler =
        Scheduler::with_default_visuals(circles(25), &config(10, 3), factory.clone()).unwrap();
    drop(scheduler);
    assert_eq!(factory.log.borrow().clears.len(), 2);
}

#[test]
fn later_batches_draw_beneath_earlier_ones() {
    let factory = RecordingFactory::default();
    let scheduler =
        Scheduler::with_default_visuals(circles(45), &config(10, 3), factory).unwrap();
    let order: Vec<usize> = scheduler
        .snapshots_in_draw_order()
        .map(|snapshot| snapshot.batch_index())
        .collect();
    assert_eq!(order, vec![4, 3, 2, 1]);
}

#[test]
fn unrenderable_objects_keep_their_timing() {
    let mut objects = circles(20);
    objects[15].kind = ObjectKind::Unknown;
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(objects, &config(10, 3), factory.clone()).unwrap();
    scheduler.tick(0.0);

    let anchor_start = 700.0;
    let hidden = &scheduler.batches()[1].objects()[5];
    assert_eq!(hidden.kind, ObjectKind::Unknown);
    assert!((hidden.preempt - (hidden.start_time - anchor_start + 450.0)).abs() < 1e-9);
    assert_eq!(factory.log.borrow().captures[0].1, 9);
}

#[test]
fn background_prepares_attach_on_tick() {
    let factory = RecordingFactory::default();
    let mut config = config(10, 3);
    config.prepare.mode = PrepareMode::Background;
    let mut scheduler =
        Scheduler::new(circles(40), &config, factory.clone(), Arc::new(DefaultVisuals)).unwrap();

    scheduler.finish_prepares();
    assert_eq!(scheduler.pending_prepares(), 0);
    scheduler.tick(0.0);
    scheduler.tick(16.0);

    let log = factory.log.borrow();
    let mut created = log.created.clone();
    created.sort_unstable();
    assert_eq!(created, vec![1, 2, 3]);
    assert_eq!(log.captures.len(), 3);
}

#[test]
fn invalid_input_fails_fast() {
    let factory = RecordingFactory::default();
    assert!(matches!(
        Scheduler::with_default_visuals(Vec::new(), &config(10, 3), factory.clone()),
        Err(SchedulerError::EmptyInput)
    ));
    assert!(matches!(
        Scheduler::with_default_visuals(circles(10), &config(3, 4), factory.clone()),
        Err(SchedulerError::Config(_))
    ));

    let mut objects = circles(4);
    objects[2].preempt = -5.0;
    assert!(matches!(
        Scheduler::with_default_visuals(objects, &config(2, 1), factory),
        Err(SchedulerError::InvalidObject { index: 2, .. })
    ));
}

#[test]
fn first_batch_cannot_be_snapshotted() {
    let factory = RecordingFactory::default();
    let mut scheduler =
        Scheduler::with_default_visuals(circles(20), &config(10, 3), factory).unwrap();
    assert!(matches!(
        scheduler.schedule_snapshot(0),
        Err(SchedulerError::LiveBatch(0))
    ));
    assert!(matches!(
        scheduler.schedule_snapshot(9),
        Err(SchedulerError::UnknownBatch(9))
    ));
}
