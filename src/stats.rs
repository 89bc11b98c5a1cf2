//! Running pitch statistics for the aggregation window.

/// Sum, count, and extrema of the voiced pitch samples in the current
/// window.
///
/// The first sample of a window seeds both extrema. After that each sample
/// updates at most one extremum, minimum checked first; a tie with either
/// extremum updates neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchStats {
    sum: u64,
    count: u64,
    min: u16,
    max: u16,
    initialized: bool,
}

impl PitchStats {
    /// Empty window.
    pub const fn new() -> Self {
        Self {
            sum: 0,
            count: 0,
            min: 0,
            max: 0,
            initialized: false,
        }
    }

    /// Folds one voiced pitch sample into the window.
    pub fn record(&mut self, pitch: u16) {
        self.sum += pitch as u64;
        self.count += 1;

        if !self.initialized {
            self.min = pitch;
            self.max = pitch;
            self.initialized = true;
        } else if pitch < self.min {
            self.min = pitch;
        } else if pitch > self.max {
            self.max = pitch;
        }
    }

    /// Integer-truncated running mean; zero while the window is empty.
    pub fn average(&self) -> u16 {
        if self.count == 0 {
            0
        } else {
            (self.sum / self.count) as u16
        }
    }

    pub fn minimum(&self) -> u16 {
        self.min
    }

    pub fn maximum(&self) -> u16 {
        self.max
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        !self.initialized
    }

    /// `(average, minimum, maximum)` if any sample contributed this window.
    pub fn snapshot(&self) -> Option<(u16, u16, u16)> {
        if self.initialized {
            Some((self.average(), self.min, self.max))
        } else {
            None
        }
    }

    /// Empties the window. Runs once per flush, whether or not any sample
    /// contributed.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PitchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_sum_count_and_extrema() {
        let mut stats = PitchStats::new();
        for pitch in [10, 3, 7] {
            stats.record(pitch);
        }
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.average(), 6);
        assert_eq!(stats.minimum(), 3);
        assert_eq!(stats.maximum(), 10);
        assert_eq!(stats.snapshot(), Some((6, 3, 10)));
    }

    #[test]
    fn first_sample_seeds_both_extrema() {
        let mut stats = PitchStats::new();
        stats.record(42);
        assert_eq!(stats.minimum(), 42);
        assert_eq!(stats.maximum(), 42);
        assert_eq!(stats.average(), 42);
    }

    #[test]
    fn extrema_move_one_direction_per_sample() {
        let mut stats = PitchStats::new();
        stats.record(5);
        stats.record(3);
        assert_eq!((stats.minimum(), stats.maximum()), (3, 5));
        stats.record(9);
        assert_eq!((stats.minimum(), stats.maximum()), (3, 9));
    }

    #[test]
    fn repeated_value_leaves_extrema_alone() {
        let mut stats = PitchStats::new();
        stats.record(7);
        stats.record(7);
        assert_eq!(stats.count(), 2);
        assert_eq!((stats.minimum(), stats.maximum()), (7, 7));
        assert_eq!(stats.average(), 7);
    }

    #[test]
    fn average_truncates_toward_zero() {
        let mut stats = PitchStats::new();
        stats.record(3);
        stats.record(4);
        assert_eq!(stats.average(), 3);
    }

    #[test]
    fn reset_empties_the_window() {
        let mut stats = PitchStats::new();
        stats.record(100);
        stats.reset();
        assert!(stats.is_empty());
        assert_eq!(stats.snapshot(), None);
        assert_eq!(stats.average(), 0);

        stats.record(9);
        assert_eq!(stats.snapshot(), Some((9, 9, 9)));
    }
}
