// Deterministic, portable pseudo-random number generator.
//
// Implements Mulberry32: a single 32-bit word of state advanced by a Weyl
// increment and finalized with two multiply-xorshift rounds. Hand-rolled with
// no RNG crate dependency so the draw sequence is identical on every platform
// and compiler.
//
// This crate is the single source of randomness for `pulsegen_music`: the
// structure planner, harmony, melody, drum and palette stages each own a
// `SeededRandom`. A stage that needs an independent stream (a second melodic
// layer, the drum engine, the renderer's humanizer) constructs a fresh
// instance from `seed + offset` via `derive`; streams never share state.
//
// **Critical constraint: determinism.** Every method must produce identical
// output given the same prior state. The core generator uses integer
// arithmetic only; float conversions happen after the 32-bit draw.

use serde::{Deserialize, Serialize};

/// Mulberry32 PRNG with 32-bit internal state.
///
/// Two instances created with the same seed produce identical sequences for
/// every method, including `choice`, `weighted_choice` and `shuffle`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    seed: u32,
    state: u32,
}

impl SeededRandom {
    pub fn new(seed: u32) -> Self {
        Self { seed, state: seed }
    }

    /// The seed this stream was constructed from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Construct an independent stream keyed by `seed + offset`.
    ///
    /// The new stream starts from scratch; it does not observe how far this
    /// stream has advanced.
    pub fn derive(&self, offset: u32) -> SeededRandom {
        SeededRandom::new(self.seed.wrapping_add(offset))
    }

    /// Generate the next `u32` in the sequence.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a uniform `f64` in [0, 1).
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }

    /// Generate a uniform value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "range_f64: low must be less than high");
        low + self.next() * (high - low)
    }

    /// Generate a uniform integer in `[min, max]` (inclusive on both ends).
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `min > max`.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        assert!(min <= max, "next_int: min must be <= max");
        let span = (max - min) as u64 + 1;
        if span > u32::MAX as u64 {
            // Two draws cover spans wider than one word.
            let wide = ((self.next_u32() as u64) << 32) | self.next_u32() as u64;
            return min + (wide % span) as i64;
        }
        let span = span as u32;
        if span.is_power_of_two() {
            return min + (self.next_u32() & (span - 1)) as i64;
        }
        let threshold = span.wrapping_neg() % span;
        loop {
            let r = self.next_u32();
            if r >= threshold {
                return min + (r % span) as i64;
            }
        }
    }

    /// Generate a uniform `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        assert!(low < high, "range_usize: low must be less than high");
        self.next_int(low as i64, high as i64 - 1) as usize
    }

    /// Return `true` with probability `p`. `p <= 0.0` is always false and
    /// `p >= 1.0` is always true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next() < p
    }

    /// Pick one element uniformly. `None` for an empty slice (no draw is
    /// consumed in that case).
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_usize(0, items.len());
        items.get(idx)
    }

    /// Pick one element with probability proportional to its weight.
    ///
    /// Weights that are non-positive or non-finite are never chosen. When no
    /// weight is usable the first element is returned, still consuming one
    /// draw so the stream position does not depend on the weights.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let usable = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let n = items.len().min(weights.len());
        let total: f64 = weights[..n].iter().map(|&w| usable(w)).sum();
        let r = self.next();
        if total <= 0.0 {
            return items.first();
        }

        let target = r * total;
        let mut cumulative = 0.0;
        let mut last_usable = 0;
        for (i, &w) in weights[..n].iter().enumerate() {
            let w = usable(w);
            if w <= 0.0 {
                continue;
            }
            last_usable = i;
            cumulative += w;
            if cumulative > target {
                return items.get(i);
            }
        }
        items.get(last_usable)
    }

    /// Shuffle in place (Fisher–Yates, from the back).
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(43);
        assert_ne!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn reseeding_restarts_the_sequence() {
        let mut a = SeededRandom::new(7);
        let first: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let mut again = SeededRandom::new(7);
        let second: Vec<u32> = (0..16).map(|_| again.next_u32()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn next_in_unit_range() {
        let mut rng = SeededRandom::new(12345);
        for _ in 0..10_000 {
            let v = rng.next();
            assert!((0.0..1.0).contains(&v), "next out of range: {v}");
        }
    }

    #[test]
    fn next_int_inclusive_bounds() {
        let mut rng = SeededRandom::new(999);
        let mut saw_min = false;
        let mut saw_max = false;
        for _ in 0..10_000 {
            let v = rng.next_int(3, 9);
            assert!((3..=9).contains(&v), "next_int out of range: {v}");
            saw_min |= v == 3;
            saw_max |= v == 9;
        }
        assert!(saw_min && saw_max, "both ends should be reachable");
    }

    #[test]
    fn next_int_negative_range() {
        let mut rng = SeededRandom::new(5);
        for _ in 0..1000 {
            let v = rng.next_int(-5, 5);
            assert!((-5..=5).contains(&v));
        }
        assert_eq!(rng.next_int(4, 4), 4);
    }

    #[test]
    fn range_f64_within_bounds() {
        let mut rng = SeededRandom::new(777);
        for _ in 0..10_000 {
            let v = rng.range_f64(1.5, 3.5);
            assert!((1.5..3.5).contains(&v), "range_f64 out of range: {v}");
        }
    }

    #[test]
    fn choice_empty_is_none() {
        let mut rng = SeededRandom::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choice(&empty).is_none());
        assert_eq!(rng.choice(&[11]), Some(&11));
    }

    #[test]
    fn weighted_choice_skips_zero_weights() {
        let mut rng = SeededRandom::new(31);
        let items = ["never", "always", "also-never"];
        for _ in 0..500 {
            let picked = rng.weighted_choice(&items, &[0.0, 2.0, -1.0]);
            assert_eq!(picked, Some(&"always"));
        }
    }

    #[test]
    fn weighted_choice_follows_weights() {
        let mut rng = SeededRandom::new(2024);
        let items = [0usize, 1];
        let mut counts = [0u32; 2];
        for _ in 0..10_000 {
            let picked = *rng.weighted_choice(&items, &[1.0, 3.0]).unwrap();
            counts[picked] += 1;
        }
        let share = counts[1] as f64 / 10_000.0;
        assert!((0.70..0.80).contains(&share), "expected ~75%, got {share}");
    }

    #[test]
    fn weighted_choice_all_zero_falls_back_to_first() {
        let mut rng = SeededRandom::new(3);
        assert_eq!(rng.weighted_choice(&['a', 'b'], &[0.0, 0.0]), Some(&'a'));
    }

    #[test]
    fn shuffle_is_a_deterministic_permutation() {
        let mut a = SeededRandom::new(88);
        let mut b = SeededRandom::new(88);
        let mut xs: Vec<u32> = (0..20).collect();
        let mut ys = xs.clone();
        a.shuffle(&mut xs);
        b.shuffle(&mut ys);
        assert_eq!(xs, ys);

        let mut sorted = xs.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn derive_is_independent_of_parent_position() {
        let mut parent = SeededRandom::new(100);
        let fresh = parent.derive(5);
        for _ in 0..50 {
            parent.next_u32();
        }
        let later = parent.derive(5);
        assert_eq!(fresh, later);
        assert_eq!(fresh, SeededRandom::new(105));
    }

    #[test]
    fn derive_wraps_instead_of_overflowing() {
        let rng = SeededRandom::new(u32::MAX);
        assert_eq!(rng.derive(2).seed(), 1);
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = SeededRandom::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = SeededRandom::new(42);
        for _ in 0..100 {
            rng.next_u32();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SeededRandom = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u32(), restored.next_u32());
        }
    }
}
