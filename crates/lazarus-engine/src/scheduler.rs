//! Cooperative virtual-time scheduler.
//!
//! The [`Scheduler`] replaces a host's "reschedule yourself by returning the
//! next fire time" timer idiom with explicit one-shot and repeating timers:
//!
//! - [`Scheduler::after`] arms a one-shot timer;
//! - [`Scheduler::every`] arms a repeating timer that re-arms itself after
//!   each firing until [`Scheduler::cancel`]led;
//! - both return a [`TimerHandle`].
//!
//! Tasks are plain values of type `T` rather than closures. The owner drains
//! due tasks one at a time with [`Scheduler::pop_due`] and dispatches them
//! itself, so a task never needs to borrow the state it acts on, and a task
//! may arm further timers that still fire within the same advance.
//!
//! Due tasks fire in order of due time, ties broken by arming order, which
//! makes every run deterministic.
//!
//! # Example
//!
//! ```
//! use lazarus_engine::scheduler::Scheduler;
//!
//! let mut sched = Scheduler::new();
//! sched.after(1.0, "once");
//! let ticker = sched.every(0.5, "tick");
//!
//! let mut fired = Vec::new();
//! while let Some((_, task)) = sched.pop_due(1.0) {
//!     fired.push(task);
//! }
//! sched.settle(1.0);
//! assert_eq!(fired, vec!["tick", "once", "tick"]);
//!
//! sched.cancel(ticker);
//! assert!(sched.pop_due(10.0).is_none());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// TimerHandle
// ---------------------------------------------------------------------------

/// Identifies an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Armed<T> {
    handle: TimerHandle,
    due: f64,
    /// Arming order, used to break due-time ties.
    seq: u64,
    interval: Option<f64>,
    task: T,
}

/// A deterministic virtual-time timer queue.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: f64,
    next_id: u64,
    next_seq: u64,
    armed: Vec<Armed<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 0,
            next_seq: 0,
            armed: Vec::new(),
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// A scheduler at time zero with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Arm a one-shot timer firing `delay` seconds from now.
    ///
    /// # Panics
    ///
    /// Panics if `delay` is negative or not finite.
    pub fn after(&mut self, delay: f64, task: T) -> TimerHandle {
        assert!(
            delay >= 0.0 && delay.is_finite(),
            "timer delay must be non-negative and finite, got {delay}"
        );
        self.arm(self.now + delay, None, task)
    }

    /// Arm a repeating timer firing every `interval` seconds, first after one
    /// interval.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is not positive and finite.
    pub fn every(&mut self, interval: f64, task: T) -> TimerHandle {
        assert!(
            interval > 0.0 && interval.is_finite(),
            "timer interval must be positive and finite, got {interval}"
        );
        self.arm(self.now + interval, Some(interval), task)
    }

    /// Disarm a timer. Returns `false` if it already fired (one-shot) or was
    /// cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.armed.len();
        self.armed.retain(|a| a.handle != handle);
        self.armed.len() != before
    }

    /// `true` while the timer is armed.
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.iter().any(|a| a.handle == handle)
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Take the earliest task due at or before `until`, moving the clock to
    /// its due time. Repeating timers are re-armed before returning.
    pub fn pop_due(&mut self, until: f64) -> Option<(TimerHandle, T)> {
        let idx = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, a)| a.due <= until)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
            .map(|(i, _)| i)?;

        let fired = self.armed.swap_remove(idx);
        self.now = self.now.max(fired.due);
        let result = (fired.handle, fired.task.clone());

        if let Some(interval) = fired.interval {
            let seq = self.bump_seq();
            self.armed.push(Armed {
                handle: fired.handle,
                due: fired.due + interval,
                seq,
                interval: Some(interval),
                task: fired.task,
            });
        }
        Some(result)
    }

    /// Move the clock to `until` once every due task has been popped.
    pub fn settle(&mut self, until: f64) {
        self.now = self.now.max(until);
    }

    /// Advance the clock by `dt` and return every task that came due, in
    /// firing order.
    ///
    /// Timers armed while handling the returned tasks are not included; use
    /// [`pop_due`](Self::pop_due) when dispatch can arm new timers that must
    /// fire within the same step.
    pub fn advance(&mut self, dt: f64) -> Vec<T> {
        let until = self.now + dt.max(0.0);
        let mut due = Vec::new();
        while let Some((_, task)) = self.pop_due(until) {
            due.push(task);
        }
        self.settle(until);
        due
    }

    fn arm(&mut self, due: f64, interval: Option<f64>, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();
        self.armed.push(Armed {
            handle,
            due,
            seq,
            interval,
            task,
        });
        handle
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
