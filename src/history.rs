use std::collections::VecDeque;

use crate::types::Sample;

pub const DEFAULT_HISTORY_CAP: usize = 5;

/// Rolling window of the most recent samples for trend display.
/// Oldest sample is evicted first once `cap` is reached.
pub struct SampleHistory {
    samples: VecDeque<Sample>,
    cap: usize,
}

impl SampleHistory {
    /// `cap` is clamped to at least 1
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        SampleHistory {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn record(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.cap {
            self.samples.pop_front();
        }
    }

    /// Oldest first
    pub fn current(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;

    fn sample(mbps: f64) -> Sample {
        Sample {
            classification: Classification::from_mbps(mbps),
            mbps,
            timestamp: format!("00:00:{:02}", mbps as u32),
        }
    }

    #[test]
    fn test_fills_up_to_cap() {
        let mut history = SampleHistory::default();
        assert!(history.is_empty());
        assert!(history.latest().is_none());

        for i in 1..=3 {
            history.record(sample(i as f64));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().map(|s| s.mbps), Some(3.0));
    }

    #[test]
    fn test_seven_records_keep_last_five_in_order() {
        let mut history = SampleHistory::default();
        for i in 1..=7 {
            history.record(sample(i as f64));
        }

        let mbps: Vec<f64> = history.current().iter().map(|s| s.mbps).collect();
        assert_eq!(mbps, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_length_is_min_of_n_and_cap() {
        for n in 0..12 {
            let mut history = SampleHistory::new(5);
            for i in 0..n {
                history.record(sample(i as f64));
            }
            assert_eq!(history.len(), n.min(5));
        }
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut history = SampleHistory::new(3);
        history.record(sample(10.0));
        history.record(sample(10.0));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_zero_cap_clamped() {
        let mut history = SampleHistory::new(0);
        history.record(sample(1.0));
        history.record(sample(2.0));
        assert_eq!(history.cap(), 1);
        assert_eq!(history.current()[0].mbps, 2.0);
    }
}
