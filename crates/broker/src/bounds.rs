/// Low and high sequence marks of a topic.
///
/// `low > high` means the topic currently holds no messages. A topic that
/// does not exist on the broker reports [`TopicBounds::EMPTY`] rather than an
/// error, so consumers treat it as "no messages yet" and wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopicBounds {
    /// Lowest available sequence number.
    pub low: u64,
    /// Highest assigned sequence number.
    pub high: u64,
}

impl TopicBounds {
    /// The bounds of a topic with no messages.
    pub const EMPTY: Self = Self { low: 1, high: 0 };

    /// Creates bounds from raw marks.
    #[must_use]
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Returns true when the topic holds no messages.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.low > self.high
    }

    /// Number of currently available messages.
    #[must_use]
    pub const fn count(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.high - self.low + 1
        }
    }

    /// The resume floor: the checkpoint value meaning "nothing read yet".
    #[must_use]
    pub const fn floor(&self) -> u64 {
        self.low.saturating_sub(1)
    }

    /// Returns true when `checkpoint` is a plausible cursor for these
    /// bounds. A stored value outside `[low - 1, high]` indicates the topic
    /// was recreated or rotated on the broker.
    #[must_use]
    pub const fn contains_cursor(&self, checkpoint: u64) -> bool {
        checkpoint >= self.floor() && checkpoint <= self.high
    }
}

/// A topic name with its current bounds, as reported by the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicInfo {
    /// Topic name.
    pub name: String,
    /// Current sequence marks.
    pub bounds: TopicBounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_low_exceeds_high() {
        assert!(TopicBounds::EMPTY.is_empty());
        assert!(TopicBounds::new(10, 9).is_empty());
        assert!(!TopicBounds::new(10, 10).is_empty());
    }

    #[test]
    fn count_spans_inclusive_marks() {
        assert_eq!(TopicBounds::new(10, 100).count(), 91);
        assert_eq!(TopicBounds::EMPTY.count(), 0);
    }

    #[test]
    fn cursor_range_is_floor_through_high() {
        let bounds = TopicBounds::new(10, 100);

        assert!(bounds.contains_cursor(9));
        assert!(bounds.contains_cursor(100));
        assert!(!bounds.contains_cursor(8));
        assert!(!bounds.contains_cursor(101));
    }

    #[test]
    fn floor_saturates_at_zero() {
        assert_eq!(TopicBounds::new(0, 5).floor(), 0);
        assert_eq!(TopicBounds::new(1, 5).floor(), 0);
    }
}
