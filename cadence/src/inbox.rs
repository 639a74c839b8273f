//! Cross-thread event submission.
//!
//! Threads other than the scheduler's owner never touch the clock or the queue.
//! Their only entry point is a [`RemoteScheduler`], which appends submissions to a
//! shared inbox under a mutex. The owner drains the inbox at the start of each
//! [`advance`](crate::Scheduler::advance) and only then computes absolute due
//! times, so a stale clock sample on the submitting thread can never influence
//! scheduling.

use crate::registry::EventType;
use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;

/// A scheduling request from a non-owning thread. Holds the *relative* delay; the
/// absolute due time is only computed by the owner at drain time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Submission {
    pub event: EventType,
    pub delay: i64,
    pub userdata: u64,
}

/// A synchronized handoff buffer between producer threads and the scheduler.
#[derive(Debug, Default, Clone)]
pub(crate) struct CrossThreadInbox {
    queue: Arc<Mutex<Vec<Submission>>>,
}

impl CrossThreadInbox {
    pub fn push(&self, submission: Submission) {
        self.queue.lock().push(submission);
    }

    /// Takes all pending submissions, in submission order. The lock is released
    /// before the caller processes any of them.
    pub fn drain(&self) -> Vec<Submission> {
        std::mem::take(&mut *self.queue.lock())
    }
}

/// A cloneable, thread-safe handle for scheduling events from outside the owner
/// thread.
///
/// Obtained from [`Scheduler::remote`](crate::Scheduler::remote). Submissions from
/// one handle are drained in submission order; an event submitted here becomes due
/// relative to the clock value at the moment the owner drains the inbox.
#[derive(Debug, Clone)]
pub struct RemoteScheduler {
    inbox: CrossThreadInbox,
}

impl RemoteScheduler {
    pub(crate) fn new(inbox: CrossThreadInbox) -> Self {
        Self { inbox }
    }

    /// Schedules `event` to fire `delay` raw ticks from the moment the owner
    /// thread drains the inbox.
    pub fn schedule(&self, delay: i64, event: EventType, userdata: u64) {
        trace!("remote submission of {event:?} with delay {delay}");
        self.inbox.push(Submission {
            event,
            delay,
            userdata,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_submission_order() {
        let inbox = CrossThreadInbox::default();
        let remote = RemoteScheduler::new(inbox.clone());
        for userdata in 0..4 {
            remote.schedule(100, EventType(0), userdata);
        }

        let drained = inbox.drain();
        let userdata: Vec<_> = drained.iter().map(|s| s.userdata).collect();
        assert_eq!(userdata, [0, 1, 2, 3]);
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn remote_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteScheduler>();
    }
}
