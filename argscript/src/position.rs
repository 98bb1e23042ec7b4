//! Mapping from processed line text back to the original line

/// Maps offsets in a rewritten line (after variable replacement) to offsets
/// in the text the user wrote.
///
/// Each entry marks a point where both texts are aligned; offsets between two
/// entries advance together.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    entries: Vec<(usize, usize)>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `processed` corresponds to `original`.
    ///
    /// Entries must be added in increasing `processed` order.
    pub fn add(&mut self, processed: usize, original: usize) {
        if let Some(last) = self.entries.last_mut()
            && last.0 == processed
        {
            last.1 = original;
            return;
        }
        self.entries.push((processed, original));
    }

    pub fn original(&self, processed: usize) -> usize {
        let index = self.entries.partition_point(|(key, _)| *key <= processed);
        if index == 0 {
            return processed;
        }
        let (key, original) = self.entries[index - 1];
        original + (processed - key)
    }

    pub fn is_identity(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_empty() {
        let map = PositionMap::new();
        assert_eq!(map.original(7), 7);
        assert!(map.is_identity());
    }

    #[test]
    fn test_replacement_shifts_following_text() {
        // "size $big -vary 1" with $big -> "10.5"
        let mut map = PositionMap::new();
        map.add(5, 5);
        map.add(9, 9);
        assert_eq!(map.original(3), 3);
        assert_eq!(map.original(6), 6);
        assert_eq!(map.original(10), 10);

        // "size $v -vary 1" with $v -> "100"
        let mut map = PositionMap::new();
        map.add(5, 5);
        map.add(8, 7);
        assert_eq!(map.original(9), 8);
    }
}
