//! The event scheduler.
//!
//! The scheduler drives a [`GlobalClock`] in lockstep with the cycles an emulated
//! CPU loop consumes, and fires registered callbacks at precise virtual times.
//!
//! # The downcount protocol
//!
//! The CPU loop never looks at the queue. It is handed a *downcount* (in scaled
//! ticks), decrements it as it executes, and calls [`advance`](Scheduler::advance)
//! once it reaches zero or below. `advance` folds the consumed ticks into the
//! clock, fires everything that became due and issues the downcount for the next
//! slice: the gap to the earliest pending event, bounded by the configured maximum
//! slice length so an idle machine still revisits the scheduler periodically.
//!
//! A loop that overran its budget simply reports a negative residual; the overrun
//! is absorbed into the lateness handed to the callbacks. Lateness is
//! observational: no temporal anomaly (negative delays, overruns, stale
//! cross-thread submissions) is ever rejected.

use crate::{
    clock::GlobalClock,
    inbox::{CrossThreadInbox, RemoteScheduler, Submission},
    queue::EventQueue,
    registry::{Callback, EventRegistry, EventType, DuplicateEventErr},
};
use easyerr::Error;
use log::{debug, trace};

/// Default bound on how long the CPU loop may run before the scheduler is
/// revisited, in raw ticks.
pub const DEFAULT_MAX_SLICE_LENGTH: i64 = 20_000;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Ceiling on the length of an idle slice, in raw ticks. Only bounds idle
    /// execution: an overrunning CPU loop is never a violation.
    pub max_slice_length: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_slice_length: DEFAULT_MAX_SLICE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, Error)]
#[error("max slice length must be positive, got {max_slice_length}")]
pub struct ConfigError {
    pub max_slice_length: i64,
}

/// The event scheduler: the temporal backbone of an emulated machine.
///
/// `C` is the machine context handed to every callback. The scheduler itself is an
/// explicit context object: independent instances coexist freely, which keeps
/// multi-machine setups and tests free of process-global state.
///
/// Exactly one thread owns the scheduler and may call its methods; other threads
/// schedule through the handle returned by [`remote`](Scheduler::remote).
pub struct Scheduler<C> {
    registry: EventRegistry<C>,
    clock: GlobalClock,
    queue: EventQueue,
    inbox: CrossThreadInbox,
    max_slice_length: i64,
    /// Raw length of the slice currently issued to the CPU loop.
    slice_length: i64,
    /// The CPU-visible countdown, in scaled ticks.
    downcount: i64,
    /// Set while `advance` is folding and firing: the clock is exact and `now()`
    /// must not apply the partial-slice correction.
    advancing: bool,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::with_config(Config::default()).expect("default config is valid")
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        if config.max_slice_length <= 0 {
            return Err(ConfigError {
                max_slice_length: config.max_slice_length,
            });
        }

        let clock = GlobalClock::new();
        let slice_length = config.max_slice_length;
        let downcount = clock.to_scaled(slice_length);
        Ok(Self {
            registry: EventRegistry::new(),
            clock,
            queue: EventQueue::new(),
            inbox: CrossThreadInbox::default(),
            max_slice_length: config.max_slice_length,
            slice_length,
            downcount,
            advancing: false,
        })
    }

    /// Registers `callback` under `name` and returns the handle used to schedule
    /// it. Names are unique per scheduler; registration is expected to happen at
    /// startup, before any scheduling.
    pub fn register(&mut self, name: &str, callback: Callback<C>) -> Result<EventType, DuplicateEventErr> {
        self.registry.register(name, callback)
    }

    /// Returns a cloneable handle for scheduling from other threads.
    pub fn remote(&self) -> RemoteScheduler {
        RemoteScheduler::new(self.inbox.clone())
    }

    /// The current virtual time, in raw ticks.
    ///
    /// Between slices this includes the portion of the issued slice the CPU loop
    /// has already consumed, so mid-slice reads see the true current time.
    #[inline(always)]
    pub fn now(&self) -> i64 {
        if self.advancing {
            self.clock.ticks()
        } else {
            self.clock.ticks() + self.slice_length - self.clock.to_raw(self.downcount)
        }
    }

    /// The CPU-visible countdown, in scaled ticks.
    #[inline(always)]
    pub fn downcount(&self) -> i64 {
        self.downcount
    }

    /// Overwrites the countdown. The CPU loop uses this to report the residual
    /// (possibly negative, if it overran) before calling [`advance`](Self::advance).
    #[inline(always)]
    pub fn set_downcount(&mut self, downcount: i64) {
        self.downcount = downcount;
    }

    /// Decrements the countdown by `cycles` scaled ticks.
    #[inline(always)]
    pub fn consume(&mut self, cycles: i64) {
        self.downcount -= cycles;
    }

    /// Sets the clock speed factor. Applies prospectively: the slice currently
    /// issued keeps the factor it was issued with, and the new factor governs
    /// countdowns from the next [`advance`](Self::advance) on.
    pub fn set_factor(&mut self, factor: f64) {
        self.clock.set_factor(factor);
    }

    pub fn set_overclock_enabled(&mut self, enabled: bool) {
        self.clock.set_overclock_enabled(enabled);
    }

    pub fn clock(&self) -> &GlobalClock {
        &self.clock
    }

    /// Mutable clock access, for administrative hooks like
    /// [`GlobalClock::set_ticks`]. Not part of normal operation.
    pub fn clock_mut(&mut self) -> &mut GlobalClock {
        &mut self.clock
    }

    /// Number of pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedules `event` to fire `delay` raw ticks from [`now`](Self::now).
    ///
    /// `delay` may be zero or negative: the event is already due and will fire on
    /// the next [`advance`](Self::advance) with a correspondingly large lateness.
    /// When called outside a callback, the current slice is shortened in place if
    /// the new event is closer than the remaining countdown.
    ///
    /// # Panics
    ///
    /// Panics if `event` was not registered with this scheduler.
    pub fn schedule(&mut self, delay: i64, event: EventType, userdata: u64) {
        // also validates the handle, outside of any lazy logging macro
        let name = self.registry.name(event);
        let due = self.now() + delay;
        trace!("scheduling {name} at {due} (delay {delay})");

        self.queue.push(due, event, userdata);

        // Inside advance the countdown is recomputed after the pop loop anyway.
        if !self.advancing {
            self.shorten_slice(delay);
        }
    }

    /// Shortens the issued slice so it ends no later than `delay` raw ticks from
    /// now. Slice length and countdown move in lockstep, keeping the consumed-tick
    /// bookkeeping of the slice exact.
    fn shorten_slice(&mut self, delay: i64) {
        // An already-due event must not issue a negative countdown.
        let delay = delay.max(0);
        if self.clock.to_scaled(delay) < self.downcount {
            self.slice_length -= self.clock.to_raw(self.downcount) - delay;
            self.downcount = self.clock.to_scaled(delay);
        }
    }

    /// Runs one scheduling slice.
    ///
    /// Drains cross-thread submissions, folds the consumed ticks of the previous
    /// slice into the clock, fires every due event (each receiving its lateness in
    /// raw ticks) and issues the countdown for the next slice.
    ///
    /// Callbacks may schedule freely, including rescheduling their own event type;
    /// entries that are already due are popped in the same call, FIFO-ordered
    /// after everything that was in the queue before them.
    pub fn advance(&mut self, ctx: &mut C) {
        self.drain_inbox();

        let consumed = self.slice_length - self.clock.to_raw(self.downcount);
        self.clock.advance(consumed);
        self.advancing = true;
        self.clock.latch_slice_factor();
        self.slice_length = self.max_slice_length;

        while let Some(entry) = self.queue.pop_due(self.clock.ticks()) {
            let lateness = self.clock.ticks() - entry.due;
            if lateness > self.max_slice_length {
                debug!(
                    "{} is very late ({lateness} ticks)",
                    self.registry.name(entry.event)
                );
            }

            let callback = self.registry.callback(entry.event);
            callback(self, ctx, entry.userdata, lateness);
        }

        self.advancing = false;
        if let Some(due) = self.queue.next_due() {
            self.slice_length = (due - self.clock.ticks()).min(self.max_slice_length);
        }
        self.downcount = self.clock.to_scaled(self.slice_length);

        trace!(
            "slice issued: {} raw ticks ({} scaled) at t={}",
            self.slice_length,
            self.downcount,
            self.clock.ticks()
        );
    }

    /// Converts drained submissions to absolute due times using the owner's view
    /// of the clock at this moment, not whatever the submitting thread may have
    /// observed.
    fn drain_inbox(&mut self) {
        for Submission {
            event,
            delay,
            userdata,
        } in self.inbox.drain()
        {
            let name = self.registry.name(event);
            let due = self.now() + delay;
            trace!("drained remote submission of {name} (due at {due})");
            self.queue.push(due, event, userdata);
        }
    }
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("clock", &self.clock)
            .field("pending", &self.queue.len())
            .field("slice_length", &self.slice_length)
            .field("downcount", &self.downcount)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut Scheduler<()>, _: &mut (), _: u64, _: i64) {}

    #[test]
    fn invalid_config_is_rejected() {
        let err = Scheduler::<()>::with_config(Config {
            max_slice_length: 0,
        })
        .unwrap_err();
        assert_eq!(err.max_slice_length, 0);
    }

    #[test]
    fn idle_slice_hits_the_ceiling() {
        let mut sched = Scheduler::new();
        sched.advance(&mut ());
        assert_eq!(sched.downcount(), DEFAULT_MAX_SLICE_LENGTH);

        sched.set_overclock_enabled(true);
        sched.set_factor(2.0);
        sched.set_downcount(0);
        sched.advance(&mut ());
        assert_eq!(sched.downcount(), DEFAULT_MAX_SLICE_LENGTH * 2);
    }

    #[test]
    fn scheduling_shortens_the_current_slice() {
        let mut sched = Scheduler::new();
        let ev = sched.register("ev", nop).unwrap();
        sched.advance(&mut ());

        sched.schedule(1000, ev, 0);
        assert_eq!(sched.downcount(), 1000);

        // a farther event leaves the countdown alone
        sched.schedule(5000, ev, 0);
        assert_eq!(sched.downcount(), 1000);

        // a nearer one shortens it
        sched.schedule(250, ev, 0);
        assert_eq!(sched.downcount(), 250);
    }

    #[test]
    fn now_tracks_partial_slice_consumption() {
        let mut sched = Scheduler::new();
        let ev = sched.register("ev", nop).unwrap();
        sched.advance(&mut ());
        sched.schedule(1000, ev, 0);

        assert_eq!(sched.now(), 0);
        sched.consume(400);
        assert_eq!(sched.now(), 400);

        // an event scheduled mid-slice is due relative to the true current time
        sched.schedule(100, ev, 0);
        assert_eq!(sched.downcount(), 100);
        sched.set_downcount(0);
        sched.advance(&mut ());
        assert_eq!(sched.now(), 500);
    }

    fn count(_: &mut Scheduler<u64>, fired: &mut u64, _: u64, _: i64) {
        *fired += 1;
    }

    // the administrative rewind hook: pending events keep their absolute due
    // times, so a rewound clock simply takes longer to reach them
    #[test]
    fn rewinding_the_clock_defers_pending_events() {
        let mut fired = 0u64;
        let mut sched = Scheduler::new();
        let ev = sched.register("ev", count).unwrap();
        sched.advance(&mut fired);
        sched.schedule(100, ev, 0);

        let ticks = sched.clock().ticks();
        sched.clock_mut().set_ticks(ticks - 1000);

        sched.set_downcount(0);
        sched.advance(&mut fired);
        assert_eq!(0, fired);
        assert_eq!(1000, sched.downcount());

        sched.set_downcount(0);
        sched.advance(&mut fired);
        assert_eq!(1, fired);
    }

    #[test]
    #[should_panic(expected = "was not created by this registry")]
    fn scheduling_foreign_handle_is_fatal() {
        let mut sched = Scheduler::<()>::new();
        let mut other = Scheduler::<()>::new();
        let foreign = other.register("other", nop).unwrap();
        sched.schedule(0, foreign, 0);
    }
}
