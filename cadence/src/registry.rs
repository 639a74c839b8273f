//! The event registry: maps human-readable names to callbacks.

use crate::scheduler::Scheduler;
use easyerr::Error;
use log::debug;

/// An event callback.
///
/// Receives the scheduler itself (so it can reschedule, including its own event
/// type), the machine context, the caller-defined userdata and the lateness of the
/// firing in raw ticks. Callbacks run synchronously inside
/// [`Scheduler::advance`](crate::Scheduler::advance) and must not block.
///
/// Plain function pointers are `Copy`, which is what allows the scheduler to hand
/// itself out mutably while a callback runs.
pub type Callback<C> = fn(&mut Scheduler<C>, &mut C, u64, i64);

/// A stable handle to a registered event type.
///
/// Handles are only minted by [`Scheduler::register`](crate::Scheduler::register)
/// and remain valid for the lifetime of the scheduler that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventType(pub(crate) u32);

struct RegisteredEvent<C> {
    name: Box<str>,
    callback: Callback<C>,
}

/// Name → callback table. Names are unique; registering a duplicate is a
/// configuration bug, not a runtime condition.
pub struct EventRegistry<C> {
    events: Vec<RegisteredEvent<C>>,
}

#[derive(Debug, Clone, Error)]
#[error("event {name} is already registered")]
pub struct DuplicateEventErr {
    pub name: String,
}

impl<C> Default for EventRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventRegistry<C> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Registers `callback` under `name` and returns its handle.
    pub fn register(&mut self, name: &str, callback: Callback<C>) -> Result<EventType, DuplicateEventErr> {
        if self.events.iter().any(|e| &*e.name == name) {
            return Err(DuplicateEventErr {
                name: name.to_owned(),
            });
        }

        let handle = EventType(u32::try_from(self.events.len()).expect("registry overflow"));
        self.events.push(RegisteredEvent {
            name: name.into(),
            callback,
        });

        debug!("registered event {name} as {handle:?}");
        Ok(handle)
    }

    /// The callback registered for `event`.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not minted by this registry. The handle space is
    /// controlled entirely by the registry, so this is always a caller bug.
    #[inline(always)]
    pub fn callback(&self, event: EventType) -> Callback<C> {
        match self.events.get(event.0 as usize) {
            Some(e) => e.callback,
            None => panic!("event handle {event:?} was not created by this registry"),
        }
    }

    /// The name `event` was registered under.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not minted by this registry.
    pub fn name(&self, event: EventType) -> &str {
        match self.events.get(event.0 as usize) {
            Some(e) => &e.name,
            None => panic!("event handle {event:?} was not created by this registry"),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<C> std::fmt::Debug for EventRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.events.iter().map(|e| &e.name))
            .finish()
    }
}
