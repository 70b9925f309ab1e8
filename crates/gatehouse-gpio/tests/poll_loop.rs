//! End-to-end polling loop tests over the mock backend.

use gatehouse_core::LineId;
use gatehouse_gpio::{
    AnyLineBackend, LineListener, LineManager, LineManagerConfig, MockLineBackend,
    MockLineHandle,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Recorder {
    edges: AtomicUsize,
    timeouts: AtomicUsize,
}

impl Recorder {
    fn edges(&self) -> usize {
        self.edges.load(Ordering::SeqCst)
    }

    fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }
}

impl LineListener for Recorder {
    fn edge(&self, _line: LineId) {
        self.edges.fetch_add(1, Ordering::SeqCst);
    }

    fn timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }
}

fn running_manager(poll_timeout_ms: u64) -> (LineManager, MockLineHandle) {
    let (backend, handle) = MockLineBackend::new();
    let mut manager = LineManager::new(
        AnyLineBackend::Mock(backend),
        LineManagerConfig {
            poll_timeout_ms,
            ..Default::default()
        },
    );
    manager.start().unwrap();
    (manager, handle)
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn test_edge_reaches_subscribed_listener() {
    let (mut manager, hw) = running_manager(20);
    let recorder = Arc::new(Recorder::default());
    let line = LineId::new(14);
    manager
        .register_listener(recorder.clone() as Arc<dyn LineListener>, line)
        .unwrap();

    hw.trigger_edge(line);
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 1));

    // The edge condition was cleared exactly once for the one edge.
    assert_eq!(hw.clear_count(line), 1);
    assert!(!hw.has_pending_edge(line));
    manager.stop().unwrap();
}

#[test]
fn test_duplicate_subscription_notified_twice() {
    let (mut manager, hw) = running_manager(20);
    let recorder = Arc::new(Recorder::default());
    let listener = recorder.clone() as Arc<dyn LineListener>;
    let line = LineId::new(5);
    manager.register_listener(Arc::clone(&listener), line).unwrap();
    manager.register_listener(listener, line).unwrap();

    hw.trigger_edge(line);
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 2));
    assert_eq!(recorder.edges(), 2);
    assert_eq!(hw.clear_count(line), 1);
    manager.stop().unwrap();
}

#[test]
fn test_timeout_callbacks_fire_without_edges() {
    let (mut manager, _hw) = running_manager(10);
    let recorder = Arc::new(Recorder::default());
    manager
        .register_listener(recorder.clone() as Arc<dyn LineListener>, LineId::new(1))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || recorder.timeouts() >= 3));
    assert_eq!(recorder.edges(), 0);
    manager.stop().unwrap();
}

#[test]
fn test_unsubscribed_edge_is_discarded() {
    let (mut manager, hw) = running_manager(10);
    let recorder = Arc::new(Recorder::default());
    manager
        .register_listener(recorder.clone() as Arc<dyn LineListener>, LineId::new(1))
        .unwrap();

    hw.trigger_edge(LineId::new(9));
    assert!(wait_until(Duration::from_secs(1), || recorder.timeouts() >= 2));
    assert_eq!(recorder.edges(), 0);
    manager.stop().unwrap();
}

#[test]
fn test_unregistering_one_line_keeps_the_other() {
    let (mut manager, hw) = running_manager(10);
    let recorder = Arc::new(Recorder::default());
    let listener = recorder.clone() as Arc<dyn LineListener>;
    manager.register_listener(Arc::clone(&listener), LineId::new(1)).unwrap();
    manager.register_listener(Arc::clone(&listener), LineId::new(2)).unwrap();

    manager.unregister_listener(&listener, LineId::new(1));
    std::thread::sleep(Duration::from_millis(50));

    hw.trigger_edge(LineId::new(2));
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 1));

    hw.trigger_edge(LineId::new(1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(recorder.edges(), 1);
    manager.stop().unwrap();
}

#[test]
fn test_interrupted_wait_is_retried() {
    let (mut manager, hw) = running_manager(20);
    let recorder = Arc::new(Recorder::default());
    let line = LineId::new(3);
    manager
        .register_listener(recorder.clone() as Arc<dyn LineListener>, line)
        .unwrap();

    hw.interrupt_next_wait();
    hw.trigger_edge(line);
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 1));
    manager.stop().unwrap();
}

#[test]
fn test_fatal_wait_error_surfaces_on_stop() {
    let (mut manager, hw) = running_manager(10);
    hw.fail_next_wait("poll: EBADF");

    // Give the loop a chance to hit the failure, then join.
    std::thread::sleep(Duration::from_millis(100));
    assert!(manager.stop().is_err());
}

#[test]
fn test_registration_while_polling_is_picked_up() {
    let (mut manager, hw) = running_manager(10);
    let recorder = Arc::new(Recorder::default());

    // Let the loop run a few empty cycles before subscribing.
    std::thread::sleep(Duration::from_millis(50));
    let line = LineId::new(22);
    manager
        .register_listener(recorder.clone() as Arc<dyn LineListener>, line)
        .unwrap();

    hw.trigger_edge(line);
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 1));
    manager.stop().unwrap();
}

#[test]
fn test_unregistered_listener_no_longer_notified() {
    let (mut manager, hw) = running_manager(10);
    let recorder = Arc::new(Recorder::default());
    let listener = recorder.clone() as Arc<dyn LineListener>;
    let line = LineId::new(8);
    manager.register_listener(Arc::clone(&listener), line).unwrap();

    hw.trigger_edge(line);
    assert!(wait_until(Duration::from_secs(2), || recorder.edges() >= 1));

    manager.unregister_listener(&listener, line);
    // Wait for a rebuild to observe the removal, then inject again.
    std::thread::sleep(Duration::from_millis(50));
    hw.trigger_edge(line);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(recorder.edges(), 1);
    manager.stop().unwrap();
}
