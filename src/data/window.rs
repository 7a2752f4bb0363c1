//! Rolling window of the most recent readings for the timeline and table.

use std::collections::VecDeque;

use super::reading::Reading;

/// Default number of readings kept in the window.
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Bounded, oldest-first view over the newest readings.
///
/// This is a cache: it can always be rebuilt from the tail of the event log,
/// which is exactly what [`RollingWindow::seed`] does at start-up.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl RollingWindow {
    /// Create an empty window. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Replace the contents with the last `capacity` readings of `readings`.
    pub fn seed<I>(&mut self, readings: I)
    where
        I: IntoIterator<Item = Reading>,
    {
        self.readings.clear();
        for reading in readings {
            self.push(reading);
        }
    }

    /// Append a reading, evicting the oldest once over capacity.
    pub fn push(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    /// Copy of the window contents, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn fault_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_faulty()).count()
    }

    /// 1 for each faulty reading, 0 for each normal one, oldest first.
    pub fn fault_series(&self) -> Vec<u64> {
        self.readings.iter().map(|r| u64::from(r.is_faulty())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reading::{evaluate, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn reading(token: &str, second: i64) -> Reading {
        let base = NaiveDateTime::parse_from_str("2024-05-01 08:00:00", TIMESTAMP_FORMAT).unwrap();
        evaluate(token, base + chrono::Duration::seconds(second)).unwrap()
    }

    #[test]
    fn test_window_keeps_last_twenty_oldest_first() {
        let mut window = RollingWindow::default();
        for i in 0..25 {
            window.push(reading(if i % 2 == 0 { "00" } else { "01" }, i));
        }

        let snapshot = window.snapshot();
        assert_eq!(snapshot.len(), 20);
        assert_eq!(snapshot.first().unwrap().timestamp(), reading("0", 5).timestamp());
        assert_eq!(snapshot.last().unwrap().timestamp(), reading("0", 24).timestamp());
        assert!(snapshot.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn test_snapshot_is_side_effect_free() {
        let mut window = RollingWindow::new(3);
        window.push(reading("1", 0));
        assert_eq!(window.snapshot(), window.snapshot());
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_seed_takes_tail() {
        let mut window = RollingWindow::new(3);
        window.push(reading("1", 100));
        window.seed((0..10).map(|i| reading("0", i)));

        let stamps: Vec<_> = window.snapshot().iter().map(|r| r.timestamp()).collect();
        assert_eq!(
            stamps,
            vec![reading("0", 7).timestamp(), reading("0", 8).timestamp(), reading("0", 9).timestamp()]
        );
    }

    #[test]
    fn test_fault_series_and_counts() {
        let mut window = RollingWindow::new(5);
        for (i, token) in ["0", "1", "1", "0"].iter().enumerate() {
            window.push(reading(token, i as i64));
        }
        assert_eq!(window.fault_series(), vec![0, 1, 1, 0]);
        assert_eq!(window.fault_count(), 2);
        assert_eq!(window.latest().unwrap().raw_token(), "0");
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut window = RollingWindow::new(0);
        window.push(reading("0", 0));
        window.push(reading("1", 1));
        assert_eq!(window.len(), 1);
        assert!(window.latest().unwrap().is_faulty());
    }
}
