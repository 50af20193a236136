//! Test RNG — deterministic `DeterministicRng` implementations for tests.

use forecast_core::rng::DeterministicRng;

/// A no-op RNG that always returns `min` for `next_u32_range` and `0.0` for
/// `next_f64`. Every snapshot id it produces is `AAAAAA`, so only use it where
/// at most one id is generated.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}

/// An RNG that returns values from a predetermined sequence, wrapping around
/// when exhausted. Values are clamped into the requested range.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }

    /// An RNG that counts upward from zero. Successive snapshot ids are
    /// distinct for the first 32 ids drawn.
    #[must_use]
    pub fn counting() -> Self {
        Self::new(Vec::new())
    }
}

impl DeterministicRng for SequenceRng {
    #[allow(clippy::cast_possible_truncation)]
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        let raw = if self.values.is_empty() {
            u32::try_from(self.index).unwrap_or(u32::MAX)
        } else {
            self.values[self.index % self.values.len()]
        };
        self.index += 1;
        let span = u64::from(max.saturating_sub(min)) + 1;
        min + (u64::from(raw) % span) as u32
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}
