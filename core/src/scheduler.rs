use std::collections::HashMap;

use tokio::time::Instant;
use tracing::debug;

/// One pending deadline per item id.
///
/// Arming an id that already has a deadline replaces it, so a burst of
/// edits keeps pushing the same single deadline forward.
#[derive(Debug, Default)]
pub struct TimerArena {
    deadlines: HashMap<i64, Instant>,
}

impl TimerArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline for `id`. Returns `true` if an earlier timer was replaced.
    pub fn arm(&mut self, id: i64, deadline: Instant) -> bool {
        let replaced = self.deadlines.insert(id, deadline).is_some();
        debug!(item_id = id, replaced, "armed write timer");
        replaced
    }

    pub fn cancel(&mut self, id: i64) -> bool {
        let cancelled = self.deadlines.remove(&id).is_some();
        if cancelled {
            debug!(item_id = id, "cancelled write timer");
        }
        cancelled
    }

    /// Drop every timer, returning how many were pending.
    pub fn clear(&mut self) -> usize {
        let n = self.deadlines.len();
        self.deadlines.clear();
        n
    }

    /// Remove and return the ids whose deadline is at or before `now`, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<i64> {
        let mut fired: Vec<(Instant, i64)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        fired.sort_unstable();
        for (_, id) in &fired {
            self.deadlines.remove(id);
        }
        fired.into_iter().map(|(_, id)| id).collect()
    }

    /// Remove every timer regardless of deadline, earliest first.
    pub fn drain_ordered(&mut self) -> Vec<i64> {
        let mut all: Vec<(Instant, i64)> = self.deadlines.drain().map(|(id, d)| (d, id)).collect();
        all.sort_unstable();
        all.into_iter().map(|(_, id)| id).collect()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    #[must_use]
    pub fn is_pending(&self, id: i64) -> bool {
        self.deadlines.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_rearm_replaces_deadline() {
        let start = Instant::now();
        let mut arena = TimerArena::new();
        assert!(!arena.arm(1, start + Duration::from_millis(500)));
        assert!(arena.arm(1, start + Duration::from_millis(900)));
        assert_eq!(arena.len(), 1);
        assert!(arena.due(start + Duration::from_millis(600)).is_empty());
        assert_eq!(arena.due(start + Duration::from_millis(900)), vec![1]);
        assert!(!arena.is_pending(1));
    }

    #[test]
    fn test_due_orders_by_deadline() {
        let start = Instant::now();
        let mut arena = TimerArena::new();
        arena.arm(3, start + Duration::from_millis(300));
        arena.arm(1, start + Duration::from_millis(100));
        arena.arm(2, start + Duration::from_millis(200));
        arena.arm(4, start + Duration::from_millis(900));
        assert_eq!(arena.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(arena.due(start + Duration::from_millis(500)), vec![1, 2, 3]);
        assert!(arena.is_pending(4));
    }

    #[test]
    fn test_cancel_and_clear() {
        let start = Instant::now();
        let mut arena = TimerArena::new();
        arena.arm(1, start);
        arena.arm(2, start);
        assert!(arena.cancel(1));
        assert!(!arena.cancel(1));
        assert_eq!(arena.clear(), 1);
        assert!(arena.is_empty());
        assert!(arena.next_deadline().is_none());
    }

    #[test]
    fn test_drain_ordered() {
        let start = Instant::now();
        let mut arena = TimerArena::new();
        arena.arm(7, start + Duration::from_secs(2));
        arena.arm(5, start + Duration::from_secs(1));
        assert_eq!(arena.drain_ordered(), vec![5, 7]);
        assert!(arena.is_empty());
    }
}
