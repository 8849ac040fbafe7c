//! Online request statistics for one aggregation scope.

/// Running sum with the smallest and largest observed value.
///
/// `min` and `max` are meaningless until the owning [`Counter`] has seen its
/// first observation; they are seeded from that observation, never from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Stat {
    fn seed(value: u64) -> Self {
        Self {
            sum: value,
            min: value,
            max: value,
        }
    }

    fn observe(&mut self, value: u64) {
        self.sum = self.sum.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn merge(&mut self, other: &Stat) {
        self.sum = self.sum.saturating_add(other.sum);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

/// A single request observation fed into a [`Counter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub ttfb: u64,
}

/// Request count plus byte and time-to-first-byte statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
    pub bytes_in: Stat,
    pub bytes_out: Stat,
    pub ttfb: Stat,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a counter from a single observation.
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            count: 1,
            bytes_in: Stat::seed(sample.bytes_in),
            bytes_out: Stat::seed(sample.bytes_out),
            ttfb: Stat::seed(sample.ttfb),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add one observation. The first observation seeds min/max.
    pub fn observe(&mut self, sample: &Sample) {
        if self.is_empty() {
            *self = Self::from_sample(sample);
            return;
        }
        self.count += 1;
        self.bytes_in.observe(sample.bytes_in);
        self.bytes_out.observe(sample.bytes_out);
        self.ttfb.observe(sample.ttfb);
    }

    /// Fold another counter into this one.
    ///
    /// Merging an empty counter is a no-op; merging into an empty counter
    /// copies the other side so min/max stay seeded from real data.
    pub fn merge(&mut self, other: &Counter) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        self.count += other.count;
        self.bytes_in.merge(&other.bytes_in);
        self.bytes_out.merge(&other.bytes_out);
        self.ttfb.merge(&other.ttfb);
    }

    /// Integer mean time-to-first-byte, `None` when nothing was counted.
    pub fn average_ttfb(&self) -> Option<u64> {
        self.ttfb.sum.checked_div(self.count)
    }
}
