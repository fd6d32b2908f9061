use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use relaykit_core::{EventBus, ListenerRegistration, Registrations, Subscriber};

#[derive(Debug)]
struct Tick;

type Trace = Arc<Mutex<Vec<String>>>;

fn record(bus: &EventBus, trace: &Trace, name: &str, order: i32) {
    let trace = trace.clone();
    let name = name.to_string();
    bus.listen_named::<Tick, _>(name.clone(), order, move |_| trace.lock().push(name.clone()));
}

#[test]
fn test_nested_bus_runs_at_its_own_order() {
    let trace = Trace::default();
    let root = EventBus::new();
    let nested = Arc::new(EventBus::named("B", 5));

    record(&nested, &trace, "C", 0);
    record(&root, &trace, "A", 0);
    root.subscribe(&nested).unwrap();
    record(&root, &trace, "D", -1);

    assert_eq!(root.send(&Tick).unwrap(), 3);
    assert_eq!(*trace.lock(), vec!["D", "A", "C"]);
}

#[test]
fn test_equal_order_keeps_subscription_order_across_kinds() {
    let trace = Trace::default();
    let root = EventBus::new();
    let first = Arc::new(EventBus::named("first", 0));
    let second = Arc::new(EventBus::named("second", 0));
    record(&first, &trace, "in-first", 100);
    record(&second, &trace, "in-second", -100);

    record(&root, &trace, "x", 0);
    root.subscribe(&first).unwrap();
    record(&root, &trace, "y", 0);
    root.subscribe(&second).unwrap();
    record(&root, &trace, "z", 0);

    root.send(&Tick).unwrap();
    assert_eq!(
        *trace.lock(),
        vec!["x", "in-first", "y", "in-second", "z"]
    );
}

#[test]
fn test_unsubscribing_a_bus_removes_its_listeners_from_the_send() {
    let trace = Trace::default();
    let root = EventBus::new();
    let nested = Arc::new(EventBus::named("nested", -5));
    record(&nested, &trace, "inner", 0);
    record(&root, &trace, "outer", 0);
    root.subscribe(&nested).unwrap();

    assert!(root.unsubscribe(&nested));
    assert!(!root.unsubscribe(&nested));

    assert_eq!(root.send(&Tick).unwrap(), 1);
    assert_eq!(*trace.lock(), vec!["outer"]);
}

#[test]
fn test_other_event_types_only_reach_buses() {
    struct Other;

    let trace = Trace::default();
    let root = EventBus::new();
    let nested = Arc::new(EventBus::named("nested", 0));
    record(&root, &trace, "tick", 0);
    root.subscribe(&nested).unwrap();

    let hits = Arc::new(Mutex::new(0));
    let counter = hits.clone();
    nested.listen::<Other, _>(0, move |_| *counter.lock() += 1);

    assert_eq!(root.send(&Other).unwrap(), 1);
    assert_eq!(*hits.lock(), 1);
    assert!(trace.lock().is_empty());
}

struct Marker {
    position: usize,
    order: i32,
    active: bool,
    seen: Arc<Mutex<Vec<usize>>>,
}

impl Subscriber for Marker {
    fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
        let order = self.order;
        Registrations::new(&self)
            .on::<Tick, _>(order, |p, _| p.seen.lock().push(p.position))
            .alive_when(|p| p.active)
            .finish()
    }
}

proptest! {
    #[test]
    fn prop_delivery_matches_sorted_active_entries(
        entries in prop::collection::vec((any::<bool>(), -4i32..4, any::<bool>()), 0..24)
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let root = EventBus::new();
        let mut markers = Vec::new();

        for (position, &(is_bus, order, active)) in entries.iter().enumerate() {
            let marker = Arc::new(Marker {
                position,
                order: if is_bus { 0 } else { order },
                active,
                seen: seen.clone(),
            });
            if is_bus {
                let bus = Arc::new(EventBus::named(format!("bus-{position}"), order));
                bus.subscribe(&marker).unwrap();
                root.subscribe(&bus).unwrap();
            } else {
                root.subscribe(&marker).unwrap();
            }
            markers.push(marker);
        }

        let mut expected: Vec<usize> = (0..entries.len()).filter(|&p| entries[p].2).collect();
        expected.sort_by_key(|&position| (entries[position].1, position));

        prop_assert_eq!(root.send(&Tick).unwrap(), expected.len());
        prop_assert_eq!(seen.lock().clone(), expected);
    }
}
