use std::collections::VecDeque;

use crate::models::Reading;

pub const DEFAULT_CAPACITY: usize = 20;

/// Bounded buffer of the most recent readings, oldest first.
#[derive(Debug, Clone)]
pub struct LiveWindow {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl Default for LiveWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LiveWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
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

    /// Sort by observation time (stable, so equal timestamps keep their
    /// delivery order), keep the newest `capacity`, and swap them in.
    pub fn replace(&mut self, mut readings: Vec<Reading>) {
        readings.sort_by_key(|reading| reading.observed_at_epoch_ms);
        let overflow = readings.len().saturating_sub(self.capacity);
        self.readings = readings.into_iter().skip(overflow).collect();
    }

    /// Push to the newest end, evicting from the oldest end. No re-sort.
    pub fn append(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        self.readings.iter()
    }

    /// The newest `count` readings, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Reading> {
        let skip = self.readings.len().saturating_sub(count);
        self.readings.iter().skip(skip).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn same_contents(&self, readings: &[Reading]) -> bool {
        self.readings.len() == readings.len() && self.readings.iter().zip(readings).all(|(a, b)| a == b)
    }
}
