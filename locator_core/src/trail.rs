//! Circular trail buffer.
//!
//! Fixed-capacity ring of the most recent scene coordinates, used only to
//! draw the visible trail. Older points are silently overwritten.
//!
//! ```text
//!  write_cursor = 7, capacity = 5
//!
//!  storage: [ s5 | s6 | s2 | s3 | s4 ]
//!                      ^ oldest = 7 % 5
//!
//!  ordered: s2 s3 s4 s5 s6
//! ```

use crate::sample::SceneSample;

/// Ring buffer of scene samples with chronological read-out.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    /// Preallocated backing storage, never resized
    storage: Vec<SceneSample>,

    /// Total writes since the last clear (monotonic, not reset on wrap)
    write_cursor: u64,

    /// Position of the rendered target marker
    marker: SceneSample,
}

impl TrailBuffer {
    /// Creates a buffer holding at most `capacity` points.
    ///
    /// A zero capacity is bumped to one so that `push` never divides by zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![SceneSample::ORIGIN; capacity.max(1)],
            write_cursor: 0,
            marker: SceneSample::ORIGIN,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of valid points, `min(write_cursor, capacity)`.
    pub fn count(&self) -> usize {
        self.write_cursor.min(self.capacity() as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write_cursor == 0
    }

    /// Total writes since the last clear.
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor
    }

    /// Whether older points have started being overwritten.
    pub fn is_wrapped(&self) -> bool {
        self.write_cursor > self.capacity() as u64
    }

    /// Current target marker position (latest point, or origin after a clear).
    pub fn marker(&self) -> SceneSample {
        self.marker
    }

    /// Writes a point at `write_cursor mod capacity` and moves the marker to it.
    pub fn push(&mut self, sample: SceneSample) {
        let idx = (self.write_cursor % self.capacity() as u64) as usize;
        self.storage[idx] = sample;
        self.write_cursor += 1;
        self.marker = sample;
    }

    /// Chronological view as two slices (oldest first), without copying.
    ///
    /// Before wrapping the backing array is already in order and the second
    /// slice is empty. Once wrapped, the oldest surviving point sits at
    /// `write_cursor mod capacity`.
    pub fn as_slices(&self) -> (&[SceneSample], &[SceneSample]) {
        if !self.is_wrapped() {
            return (&self.storage[..self.count()], &[]);
        }
        let start = (self.write_cursor % self.capacity() as u64) as usize;
        let (newer, older) = self.storage.split_at(start);
        (older, newer)
    }

    /// Iterates points oldest first.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &SceneSample> + '_ {
        let (a, b) = self.as_slices();
        a.iter().chain(b.iter())
    }

    /// Contiguous, order-correct copy of the trail for the rendering surface.
    pub fn snapshot_ordered(&self) -> Vec<SceneSample> {
        let (a, b) = self.as_slices();
        let mut out = Vec::with_capacity(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
        out
    }

    /// Empties the trail, zeroes storage and returns the marker to the origin.
    pub fn clear(&mut self) {
        self.storage.fill(SceneSample::ORIGIN);
        self.write_cursor = 0;
        self.marker = SceneSample::ORIGIN;
    }

    /// Drops the backing storage entirely (engine teardown).
    pub(crate) fn release(&mut self) {
        self.storage = vec![SceneSample::ORIGIN];
        self.storage.shrink_to_fit();
        self.write_cursor = 0;
        self.marker = SceneSample::ORIGIN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(x: f64) -> SceneSample {
        SceneSample::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_push_before_wrap_is_in_order() {
        let mut trail = TrailBuffer::new(4);
        trail.push(s(1.0));
        trail.push(s(2.0));

        assert_eq!(trail.count(), 2);
        assert!(!trail.is_wrapped());
        assert_eq!(trail.snapshot_ordered(), vec![s(1.0), s(2.0)]);
        assert_eq!(trail.marker(), s(2.0));
    }

    #[test]
    fn test_wraparound_capacity_two() {
        let mut trail = TrailBuffer::new(2);
        trail.push(s(1.0));
        trail.push(s(2.0));
        trail.push(s(3.0));

        assert_eq!(trail.count(), 2);
        assert_eq!(trail.write_cursor(), 3);
        assert!(trail.is_wrapped());
        assert_eq!(trail.snapshot_ordered(), vec![s(2.0), s(3.0)]);
    }

    #[test]
    fn test_exactly_full_is_not_wrapped() {
        let mut trail = TrailBuffer::new(3);
        for i in 1..=3 {
            trail.push(s(i as f64));
        }
        assert!(!trail.is_wrapped());
        assert_eq!(trail.snapshot_ordered(), vec![s(1.0), s(2.0), s(3.0)]);

        trail.push(s(4.0));
        assert_eq!(trail.snapshot_ordered(), vec![s(2.0), s(3.0), s(4.0)]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut trail = TrailBuffer::new(3);
        for i in 1..=5 {
            trail.push(s(i as f64));
        }
        trail.clear();

        assert!(trail.is_empty());
        assert_eq!(trail.count(), 0);
        assert_eq!(trail.write_cursor(), 0);
        assert_eq!(trail.marker(), SceneSample::ORIGIN);
        assert!(trail.snapshot_ordered().is_empty());

        trail.push(s(9.0));
        assert_eq!(trail.snapshot_ordered(), vec![s(9.0)]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut trail = TrailBuffer::new(0);
        trail.push(s(1.0));
        trail.push(s(2.0));
        assert_eq!(trail.capacity(), 1);
        assert_eq!(trail.snapshot_ordered(), vec![s(2.0)]);
    }

    proptest! {
        #[test]
        fn prop_snapshot_is_last_capacity_pushes(
            capacity in 1usize..32,
            values in proptest::collection::vec(-1e6f64..1e6, 0..200),
        ) {
            let mut trail = TrailBuffer::new(capacity);
            for v in &values {
                trail.push(s(*v));
                prop_assert!(trail.count() <= capacity);
            }

            let keep = values.len().min(capacity);
            let expected: Vec<SceneSample> = values[values.len() - keep..].iter().map(|v| s(*v)).collect();
            prop_assert_eq!(trail.snapshot_ordered(), expected);
            prop_assert_eq!(trail.iter_ordered().count(), keep);
        }
    }
}
