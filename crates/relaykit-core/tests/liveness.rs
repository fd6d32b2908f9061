use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread;
use std::time::Duration;

use relaykit_core::{EventBus, ListenerRegistration, Registrations, Subscriber};

/// Run `f` on another thread and fail instead of hanging if it blocks.
fn returns<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("bus call blocked")
}

struct Reading(u32);

#[derive(Default)]
struct Gauge {
    enabled: AtomicBool,
    total: AtomicUsize,
}

impl Subscriber for Gauge {
    fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
        Registrations::new(&self)
            .on_named::<Reading, _>("gauge", 0, |g, r| {
                g.total.fetch_add(r.0 as usize, Ordering::SeqCst);
            })
            .alive_when(|g| g.enabled.load(Ordering::SeqCst))
            .finish()
    }
}

#[test]
fn test_inactive_subscriber_is_skipped_but_kept() {
    let bus = EventBus::new();
    let gauge = Arc::new(Gauge::default());
    bus.subscribe(&gauge).unwrap();

    assert_eq!(bus.send(&Reading(3)).unwrap(), 0);
    assert_eq!(bus.subscriber_count(), 1);
    assert!(!bus.subscribers()[0].active);

    gauge.enabled.store(true, Ordering::SeqCst);
    assert_eq!(bus.send(&Reading(3)).unwrap(), 1);
    assert_eq!(gauge.total.load(Ordering::SeqCst), 3);
}

#[test]
fn test_compact_removes_inactive_registrations() {
    let bus = EventBus::new();
    let closed = Arc::new(Gauge::default());
    let open = Arc::new(Gauge::default());
    open.enabled.store(true, Ordering::SeqCst);
    bus.subscribe(&closed).unwrap();
    bus.subscribe(&open).unwrap();

    assert_eq!(bus.compact(), 1);
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(bus.compact(), 0);

    // The closed gauge is gone even once it opens
    closed.enabled.store(true, Ordering::SeqCst);
    assert_eq!(bus.send(&Reading(1)).unwrap(), 1);
    assert_eq!(closed.total.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dropped_subscriber_goes_inactive() {
    let bus = EventBus::new();
    let gauge = Arc::new(Gauge::default());
    gauge.enabled.store(true, Ordering::SeqCst);
    bus.subscribe(&gauge).unwrap();

    // Registrations hold the gauge weakly
    assert_eq!(Arc::strong_count(&gauge), 1);
    drop(gauge);

    assert_eq!(bus.send(&Reading(1)).unwrap(), 0);
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(bus.compact(), 1);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn test_unsubscribe_removes_every_registration_of_a_subscriber() {
    struct Reset;

    struct Panel {
        resets: AtomicUsize,
    }

    impl Subscriber for Panel {
        fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
            Registrations::new(&self)
                .on::<Reading, _>(0, |_, _| {})
                .on::<Reset, _>(0, |p, _| {
                    p.resets.fetch_add(1, Ordering::SeqCst);
                })
                .finish()
        }
    }

    let bus = EventBus::new();
    let panel = Arc::new(Panel {
        resets: AtomicUsize::new(0),
    });
    bus.subscribe(&panel).unwrap();
    assert_eq!(bus.subscriber_count(), 2);

    assert!(bus.unsubscribe(&panel));
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(bus.send(&Reset).unwrap(), 0);
    assert!(!bus.unsubscribe(&panel));
}

#[test]
fn test_inactive_nested_bus_is_skipped() {
    use relaykit_core::{Bus, EventType, Invoker};

    struct Muted {
        calls: AtomicUsize,
    }

    impl Bus for Muted {
        fn forward(
            &self,
            _event: &dyn std::any::Any,
            _event_type: EventType,
            _invoker: &mut dyn Invoker,
            _depth: usize,
        ) -> relaykit_core::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }

        fn is_active(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "muted"
        }
    }

    let bus = EventBus::new();
    let muted = Arc::new(Muted {
        calls: AtomicUsize::new(0),
    });
    bus.subscribe_bus(muted.clone()).unwrap();

    assert_eq!(bus.send(&Reading(1)).unwrap(), 0);
    assert_eq!(muted.calls.load(Ordering::SeqCst), 0);
    assert_eq!(bus.compact(), 1);
}

struct Watcher {
    bus: Arc<EventBus>,
    seen: AtomicUsize,
}

impl Subscriber for Watcher {
    fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
        Registrations::new(&self)
            .on_named::<Reading, _>("watcher", 0, |w, _| {
                w.seen.fetch_add(1, Ordering::SeqCst);
            })
            .alive_when(|w| w.bus.subscriber_count() < 2)
            .finish()
    }
}

#[test]
fn test_liveness_predicate_may_use_its_own_bus() {
    let bus = Arc::new(EventBus::new());
    let watcher = Arc::new(Watcher {
        bus: bus.clone(),
        seen: AtomicUsize::new(0),
    });
    bus.subscribe(&watcher).unwrap();
    assert_eq!(bus.send(&Reading(1)).unwrap(), 1);

    let handle = bus.clone();
    let infos = returns(move || handle.subscribers());
    assert_eq!(infos.len(), 1);
    assert!(infos[0].active);

    let handle = bus.clone();
    returns(move || handle.log_subscribers());

    // A second registration turns the watcher inactive
    bus.listen::<Reading, _>(0, |_| {});
    let handle = bus.clone();
    assert_eq!(returns(move || handle.compact()), 1);
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(watcher.seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_nested_bus_callbacks_run_outside_the_lock() {
    use relaykit_core::{Bus, EventType, Invoker};

    struct Leaf {
        parent: Weak<EventBus>,
        dropped: Arc<AtomicUsize>,
    }

    impl Bus for Leaf {
        fn forward(
            &self,
            _event: &dyn std::any::Any,
            _event_type: EventType,
            _invoker: &mut dyn Invoker,
            _depth: usize,
        ) -> relaykit_core::Result<usize> {
            Ok(0)
        }

        fn order(&self) -> i32 {
            self.parent.upgrade().map_or(0, |bus| bus.subscriber_count() as i32)
        }

        fn is_active(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "leaf"
        }
    }

    impl Drop for Leaf {
        fn drop(&mut self) {
            let remaining = self.parent.upgrade().map(|bus| bus.subscriber_count());
            self.dropped.fetch_add(remaining.unwrap_or(0) + 1, Ordering::SeqCst);
        }
    }

    let root = Arc::new(EventBus::new());
    let dropped = Arc::new(AtomicUsize::new(0));
    let leaf = Arc::new(Leaf {
        parent: Arc::downgrade(&root),
        dropped: dropped.clone(),
    });
    let handle = root.clone();
    returns(move || handle.subscribe_bus(leaf)).unwrap();
    assert_eq!(root.subscriber_count(), 1);

    let handle = root.clone();
    assert_eq!(returns(move || handle.compact()), 1);
    // Dropped once, seeing an empty root
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}
