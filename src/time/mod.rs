//! Timer service - the clock that drives playback
//!
//! Nodes never sleep or own threads; they schedule named tasks against an
//! injected [`TimerService`] and react when the host pumps the clock. The
//! bundled [`TimerQueue`] is a deterministic simulated clock, which is also
//! what makes the whole state machine testable without wall time.

use tracing::debug;

use crate::dialogue::NodeId;

/// Identity of one scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// What to do when a timer fires
///
/// Tasks are data rather than closures so schedules can be inspected,
/// logged, and dispatched by the runtime that owns the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// A fragment's speech duration elapsed
    SpeechComplete {
        /// Owning node
        node: NodeId,
        /// Fragment index within the node
        fragment: usize,
    },
    /// A fragment's post-speech padding elapsed
    PaddingComplete {
        /// Owning node
        node: NodeId,
        /// Fragment index within the node
        fragment: usize,
    },
}

/// Scheduling capability handed to the playback machine
pub trait TimerService: Send + Sync {
    /// Current clock time in seconds
    fn now(&self) -> f64;

    /// Schedule a task `delay` seconds from now
    fn schedule(&mut self, delay: f32, task: TimerTask) -> TimerId;

    /// Cancel a pending timer; cancelling a fired or unknown id is a no-op
    fn cancel(&mut self, id: TimerId);

    /// Seconds until a pending timer fires; `None` if it is not pending
    fn remaining(&self, id: TimerId) -> Option<f32>;

    /// Move the clock forward and return the due tasks ordered by due time
    ///
    /// Tasks scheduled while the caller dispatches this batch are picked up
    /// by a follow-up `advance(0.0)`.
    fn advance(&mut self, dt: f32) -> Vec<(TimerId, TimerTask)>;
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    id: TimerId,
    due_at: f64,
    task: TimerTask,
}

/// Deterministic simulated-clock timer queue
///
/// Ids are sequential, and entries due at the same instant fire in schedule
/// order, so a given call sequence always produces the same dispatch order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: f64,
    next_id: u64,
    entries: Vec<TimerEntry>,
}

impl TimerQueue {
    /// A queue at clock zero with nothing scheduled
    pub fn new() -> Self {
        Self::default()
    }

    /// How many timers are pending
    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}

impl TimerService for TimerQueue {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, delay: f32, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due_at = self.now + f64::from(delay.max(0.0));
        debug!(timer = id.0, delay, ?task, "timer scheduled");
        self.entries.push(TimerEntry { id, due_at, task });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.entries.retain(|entry| entry.id != id);
    }

    fn remaining(&self, id: TimerId) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| (entry.due_at - self.now).max(0.0) as f32)
    }

    fn advance(&mut self, dt: f32) -> Vec<(TimerId, TimerTask)> {
        self.now += f64::from(dt.max(0.0));
        let now = self.now;
        let mut due: Vec<TimerEntry> = Vec::new();
        self.entries.retain(|entry| {
            if entry.due_at <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| {
            a.due_at
                .partial_cmp(&b.due_at)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.0.cmp(&b.id.0))
        });
        due.into_iter().map(|entry| (entry.id, entry.task)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(fragment: usize) -> TimerTask {
        TimerTask::SpeechComplete {
            node: NodeId::new(),
            fragment,
        }
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let mut queue = TimerQueue::new();
        let late = queue.schedule(2.0, task(0));
        let early = queue.schedule(1.0, task(1));

        let fired = queue.advance(2.0);
        let ids: Vec<TimerId> = fired.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![early, late]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_simultaneous_timers_fire_in_schedule_order() {
        let mut queue = TimerQueue::new();
        let first = queue.schedule(1.0, task(0));
        let second = queue.schedule(1.0, task(1));

        let fired = queue.advance(1.0);
        let ids: Vec<TimerId> = fired.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_not_yet_due_timers_stay_pending() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(1.0, task(0));

        assert!(queue.advance(0.5).is_empty());
        assert_eq!(queue.remaining(id), Some(0.5));

        let fired = queue.advance(0.5);
        assert_eq!(fired.len(), 1);
        assert_eq!(queue.remaining(id), None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(1.0, task(0));
        queue.cancel(id);
        queue.cancel(id);
        assert!(queue.advance(2.0).is_empty());
    }

    #[test]
    fn test_zero_advance_collects_tasks_scheduled_during_dispatch() {
        let mut queue = TimerQueue::new();
        queue.schedule(1.0, task(0));
        assert_eq!(queue.advance(1.0).len(), 1);

        // Simulates a completion handler chaining the next phase at the
        // same instant
        queue.schedule(0.0, task(1));
        assert_eq!(queue.advance(0.0).len(), 1);
        assert!(queue.advance(0.0).is_empty());
    }

    #[test]
    fn test_negative_delay_clamps_to_immediate() {
        let mut queue = TimerQueue::new();
        queue.schedule(-3.0, task(0));
        assert_eq!(queue.advance(0.0).len(), 1);
    }
}
