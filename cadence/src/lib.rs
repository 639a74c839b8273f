//! The timing backbone of an emulated machine.
//!
//! `cadence` drives a virtual clock in lockstep with the cycles consumed by an
//! emulated CPU loop and fires registered callbacks at precise virtual times.
//! Every hardware subsystem that must react after N cycles — interrupt timers,
//! video sync pulses, periodic DMA — schedules its work through the
//! [`Scheduler`].
//!
//! The clock is purely virtual: a tick elapses when the CPU loop consumes one,
//! never because wall-clock time passed. See [`scheduler`] for the downcount
//! protocol between the scheduler and the CPU loop.
//!
//! ```
//! use cadence::Scheduler;
//!
//! struct Machine {
//!     vblanks: u64,
//! }
//!
//! fn vblank(_: &mut Scheduler<Machine>, machine: &mut Machine, _: u64, _: i64) {
//!     machine.vblanks += 1;
//! }
//!
//! let mut machine = Machine { vblanks: 0 };
//! let mut sched = Scheduler::new();
//! let vblank = sched.register("vblank", vblank).unwrap();
//!
//! sched.advance(&mut machine);
//! sched.schedule(500, vblank, 0);
//!
//! // the CPU loop consumes the issued countdown, then yields back
//! sched.consume(sched.downcount());
//! sched.advance(&mut machine);
//! assert_eq!(machine.vblanks, 1);
//! assert_eq!(sched.now(), 500);
//! ```

pub mod clock;
pub mod inbox;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use clock::GlobalClock;
pub use inbox::RemoteScheduler;
pub use registry::{Callback, EventType, DuplicateEventErr};
pub use scheduler::{Config, ConfigError, DEFAULT_MAX_SLICE_LENGTH, Scheduler};
