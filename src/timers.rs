//! Scheduled callbacks for the single-threaded event loop.
//!
//! Nothing on the loop thread sleeps. Every delay the automation needs is a
//! timer entry here, keyed by a deadline on a monotonic offset from loop
//! start. The loop asks for the next deadline, waits for events until then,
//! and pops whatever is due. Tests drive the same queue by advancing `now`
//! explicitly.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Handle to a scheduled timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    deadline: Duration,
    id: TimerId,
    task: T,
}

// Ordered by (deadline, id) so equal deadlines fire in scheduling order.
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.deadline, self.id) == (other.deadline, other.id)
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.id).cmp(&(other.deadline, other.id))
    }
}

/// Deadline-ordered queue of pending tasks.
#[derive(Debug)]
pub struct TimerQueue<T> {
    now: Duration,
    next_id: u64,
    heap: BinaryHeap<Reverse<Entry<T>>>,
    cancelled: HashSet<TimerId>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }
    }

    #[cfg(test)]
    /// Current loop time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to fire `delay` from now.
    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(Entry {
            deadline: self.now + delay,
            id,
            task,
        }));
        id
    }

    /// Cancel a pending timer. Cancelling a timer that already fired is a
    /// no-op.
    pub fn cancel(&mut self, id: TimerId) {
        if self.heap.iter().any(|Reverse(e)| e.id == id) {
            self.cancelled.insert(id);
        }
    }

    #[cfg(test)]
    /// Whether `id` is still waiting to fire.
    pub fn is_pending(&self, id: TimerId) -> bool {
        !self.cancelled.contains(&id) && self.heap.iter().any(|Reverse(e)| e.id == id)
    }

    /// Time remaining until the earliest live deadline, if any.
    pub fn until_next(&mut self) -> Option<Duration> {
        self.drop_cancelled_head();
        self.heap
            .peek()
            .map(|Reverse(e)| e.deadline.saturating_sub(self.now))
    }

    /// Move the clock forward (never backward).
    pub fn advance_to(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Pop the next task whose deadline is at or before `limit`, moving the
    /// clock to that deadline. Timers scheduled from inside the callback are
    /// then relative to the moment the task was due, not to `limit`.
    pub fn pop_until(&mut self, limit: Duration) -> Option<(TimerId, T)> {
        self.drop_cancelled_head();
        let deadline = match self.heap.peek() {
            Some(Reverse(e)) if e.deadline <= limit => e.deadline,
            _ => return None,
        };
        self.advance_to(deadline);
        let Reverse(entry) = self.heap.pop()?;
        Some((entry.id, entry.task))
    }

    #[cfg(test)]
    /// Pop the next task that is already due.
    pub fn pop_due(&mut self) -> Option<(TimerId, T)> {
        self.pop_until(self.now)
    }

    #[cfg(test)]
    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(e)| !self.cancelled.contains(&e.id))
            .count()
    }

    fn drop_cancelled_head(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            if !self.cancelled.remove(&head.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(q: &mut TimerQueue<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| q.pop_due().map(|(_, t)| t)).collect()
    }

    #[test]
    fn nothing_due_before_deadline() {
        let mut q = TimerQueue::new();
        q.schedule(ms(100), "a");
        q.advance_to(ms(99));
        assert!(q.pop_due().is_none());
        q.advance_to(ms(100));
        assert_eq!(drain(&mut q), vec!["a"]);
    }

    #[test]
    fn fires_in_deadline_order_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(ms(300), "late");
        q.schedule(ms(100), "first");
        q.schedule(ms(100), "second");
        q.advance_to(ms(1000));
        assert_eq!(drain(&mut q), vec!["first", "second", "late"]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(10), "a");
        q.schedule(ms(20), "b");
        q.cancel(a);
        assert!(!q.is_pending(a));
        assert_eq!(q.len(), 1);
        q.advance_to(ms(50));
        assert_eq!(drain(&mut q), vec!["b"]);
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(10), "a");
        q.advance_to(ms(10));
        assert_eq!(drain(&mut q), vec!["a"]);
        q.cancel(a);
        let b = q.schedule(ms(5), "b");
        assert!(q.is_pending(b));
        q.advance_to(ms(15));
        assert_eq!(drain(&mut q), vec!["b"]);
    }

    #[test]
    fn until_next_skips_cancelled_head() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(10), "a");
        q.schedule(ms(40), "b");
        q.cancel(a);
        assert_eq!(q.until_next(), Some(ms(40)));
        q.advance_to(ms(25));
        assert_eq!(q.until_next(), Some(ms(15)));
    }

    #[test]
    fn schedule_is_relative_to_current_time() {
        let mut q = TimerQueue::new();
        q.advance_to(ms(500));
        q.schedule(ms(100), "a");
        q.advance_to(ms(599));
        assert!(q.pop_due().is_none());
        q.advance_to(ms(600));
        assert_eq!(drain(&mut q), vec!["a"]);
    }

    #[test]
    fn pop_until_steps_clock_to_each_deadline() {
        let mut q = TimerQueue::new();
        q.schedule(ms(100), "a");
        q.schedule(ms(400), "b");
        let (_, task) = q.pop_until(ms(1000)).unwrap();
        assert_eq!(task, "a");
        assert_eq!(q.now(), ms(100));
        q.schedule(ms(50), "chained");
        let order: Vec<_> = std::iter::from_fn(|| q.pop_until(ms(1000)).map(|(_, t)| t)).collect();
        assert_eq!(order, vec!["chained", "b"]);
        assert_eq!(q.now(), ms(400));
    }

    #[test]
    fn clock_never_moves_backward() {
        let mut q: TimerQueue<&str> = TimerQueue::new();
        q.advance_to(ms(100));
        q.advance_to(ms(50));
        assert_eq!(q.now(), ms(100));
    }
}
