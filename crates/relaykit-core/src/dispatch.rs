//! Merge dispatch over a listener snapshot and a bus snapshot.
//!
//! Both snapshots are already sorted by `(order, index)`, so one event is
//! delivered in global order with a two-cursor merge instead of building
//! and sorting a combined list per send.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::InvocationPolicy;
use crate::error::{Error, Result};
use crate::pool::BusWrapper;
use crate::registration::{EventType, Keyed, ListenerRegistration};

/// A nested dispatch engine that receives every event type.
pub trait Bus: Send + Sync {
    /// Re-dispatch an event through this bus's own listeners and buses.
    ///
    /// `depth` counts how many buses the event already went through.
    /// Returns the number of listener deliveries.
    fn forward(
        &self,
        event: &dyn Any,
        event_type: EventType,
        invoker: &mut dyn Invoker,
        depth: usize,
    ) -> Result<usize>;

    /// Priority of this bus inside the bus that holds it
    fn order(&self) -> i32 {
        0
    }

    /// Whether the bus should currently receive events
    fn is_active(&self) -> bool {
        true
    }

    /// Diagnostic name
    fn name(&self) -> &str;
}

/// Invocation strategy: decides whether and how a listener is called.
pub trait Invoker {
    /// Deliver `event` to `listener`, returning whether the handler ran
    fn invoke(&mut self, listener: &ListenerRegistration, event: &dyn Any) -> bool;
}

/// Delivers to every active listener
#[derive(Debug, Default, Clone, Copy)]
pub struct DeliverAll;

impl Invoker for DeliverAll {
    fn invoke(&mut self, listener: &ListenerRegistration, event: &dyn Any) -> bool {
        listener.react(event);
        true
    }
}

/// Delivers only to listeners accepted by a predicate.
///
/// Buses are always entered; the predicate is applied to the listeners
/// inside them.
pub struct DeliverIf<P> {
    predicate: P,
}

impl<P> DeliverIf<P>
where
    P: FnMut(&ListenerRegistration) -> bool,
{
    /// Wrap a predicate
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<P> Invoker for DeliverIf<P>
where
    P: FnMut(&ListenerRegistration) -> bool,
{
    fn invoke(&mut self, listener: &ListenerRegistration, event: &dyn Any) -> bool {
        if (self.predicate)(listener) {
            listener.react(event);
            true
        } else {
            false
        }
    }
}

/// One send on one bus
pub(crate) struct Dispatch<'a> {
    pub bus: &'a str,
    pub policy: InvocationPolicy,
    pub depth: usize,
}

impl Dispatch<'_> {
    /// Deliver to every active entry of both snapshots in `(order, index)`
    /// order. Inactive entries are skipped and never compared.
    pub fn run(
        &self,
        event: &dyn Any,
        event_type: EventType,
        listeners: &[Arc<ListenerRegistration>],
        buses: &[Arc<BusWrapper>],
        invoker: &mut dyn Invoker,
    ) -> Result<usize> {
        if listeners.is_empty() && buses.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        let mut failure = None;
        let (mut i, mut j) = (0, 0);

        while i < listeners.len() && j < buses.len() {
            let listener = &listeners[i];
            if !listener.is_active() {
                i += 1;
                continue;
            }
            let wrapper = &buses[j];
            if !wrapper.is_active() {
                j += 1;
                continue;
            }

            if listener.sort_key().precedes(&wrapper.sort_key()) {
                delivered += self.invoke(listener, event, event_type, invoker);
                i += 1;
            } else {
                delivered += self.forward(wrapper, event, event_type, invoker, &mut failure);
                j += 1;
            }
        }

        for listener in &listeners[i..] {
            if listener.is_active() {
                delivered += self.invoke(listener, event, event_type, invoker);
            }
        }
        for wrapper in &buses[j..] {
            if wrapper.is_active() {
                delivered += self.forward(wrapper, event, event_type, invoker, &mut failure);
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(delivered),
        }
    }

    fn invoke(
        &self,
        listener: &ListenerRegistration,
        event: &dyn Any,
        event_type: EventType,
        invoker: &mut dyn Invoker,
    ) -> usize {
        let delivered = self.guard(listener.name(), event_type, || {
            invoker.invoke(listener, event)
        });
        usize::from(delivered.unwrap_or(false))
    }

    /// Forward into a nested bus. A failed nested bus never ends the walk:
    /// under `Propagate` its first error is kept and returned once every
    /// entry has been visited, under `LogAndContinue` it is logged and
    /// dropped.
    fn forward(
        &self,
        wrapper: &BusWrapper,
        event: &dyn Any,
        event_type: EventType,
        invoker: &mut dyn Invoker,
        failure: &mut Option<Error>,
    ) -> usize {
        let Some(bus) = wrapper.bus() else {
            return 0;
        };
        let result = self.guard(bus.name(), event_type, || {
            bus.forward(event, event_type, invoker, self.depth + 1)
        });

        match result {
            Some(Ok(delivered)) => delivered,
            Some(Err(err)) => {
                match self.policy {
                    InvocationPolicy::Propagate => {
                        failure.get_or_insert(err);
                    }
                    InvocationPolicy::LogAndContinue => {
                        tracing::error!(
                            bus = self.bus,
                            subscriber = bus.name(),
                            event = event_type.name(),
                            "Nested bus failed: {}",
                            err
                        );
                    }
                }
                0
            }
            None => 0,
        }
    }

    /// Run one invocation under the bus's policy. `None` means the
    /// invocation panicked and the panic was logged.
    fn guard<R>(&self, target: &str, event_type: EventType, f: impl FnOnce() -> R) -> Option<R> {
        match self.policy {
            InvocationPolicy::Propagate => Some(f()),
            InvocationPolicy::LogAndContinue => match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => Some(value),
                Err(payload) => {
                    tracing::error!(
                        bus = self.bus,
                        subscriber = target,
                        event = event_type.name(),
                        "Subscriber panicked: {}",
                        panic_message(payload.as_ref())
                    );
                    None
                }
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
