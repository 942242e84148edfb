use super::{Generator, SharedCounter};
use crate::random::{fnv1a_64, rand_f64};
use rand::rngs::SmallRng;
use std::sync::Arc;

/// Zipfian sampler over [base, base + items). Popular ranks are the small
/// values. The zeta normalization constant is cached and extended
/// incrementally when the item count grows, never recomputed from scratch.
pub struct ZipfianGenerator {
    items: u64,
    base: u64,
    theta: f64,
    zeta_n: f64,
    zeta_2: f64,
    alpha: f64,
    eta: f64,
    threshold: f64,
    count_for_zeta: u64,
    last: u64,
}

impl ZipfianGenerator {
    pub fn new(min: u64, max: u64, theta: f64) -> Self {
        debug_assert!(max >= min);
        debug_assert!((0.0..1.0).contains(&theta));
        let items = max - min + 1;
        let zeta_2 = Self::zeta(0, 2, theta, 0.0);
        let zeta_n = Self::zeta(0, items, theta, 0.0);
        let mut gen = ZipfianGenerator {
            items,
            base: min,
            theta,
            zeta_n,
            zeta_2,
            alpha: 1.0 / (1.0 - theta),
            eta: 0.0,
            threshold: 1.0 + 0.5f64.powf(theta),
            count_for_zeta: items,
            last: min,
        };
        gen.eta = gen.compute_eta();
        gen
    }

    fn compute_eta(&self) -> f64 {
        (1.0 - (2.0 / self.items as f64).powf(1.0 - self.theta))
            / (1.0 - self.zeta_2 / self.zeta_n)
    }

    /// Incremental zeta: extends a partial sum over (from, to].
    fn zeta(from: u64, to: u64, theta: f64, initial_sum: f64) -> f64 {
        let mut sum = initial_sum;
        for i in from + 1..=to {
            sum += (1.0 / i as f64).powf(theta);
        }
        sum
    }

    /// Draws a sample as if the generator covered `items` values. Growing
    /// the item count extends the cached zeta constant.
    pub fn next_for(&mut self, items: u64, rng: &mut SmallRng) -> u64 {
        if items > self.count_for_zeta {
            self.zeta_n = Self::zeta(self.count_for_zeta, items, self.theta, self.zeta_n);
            self.count_for_zeta = items;
            self.items = items;
            self.eta = self.compute_eta();
        }
        let u = rand_f64(rng);
        let uz = u * self.zeta_n;
        self.last = if uz < 1.0 {
            self.base
        } else if uz < self.threshold {
            self.base + 1
        } else {
            self.base
                + (self.items as f64 * (self.eta * u - self.eta + 1.0).powf(self.alpha)) as u64
        };
        self.last
    }
}

impl Generator for ZipfianGenerator {
    fn next(&mut self, rng: &mut SmallRng) -> u64 {
        let items = self.items;
        self.next_for(items, rng)
    }

    fn last(&self) -> u64 {
        self.last
    }
}

/// Zipfian ranks scattered over the keyspace through FNV hashing, so the
/// popular keys are not clustered at the low end.
pub struct ScrambledZipfianGenerator {
    zipfian: ZipfianGenerator,
    min: u64,
    item_count: u64,
    last: u64,
}

impl ScrambledZipfianGenerator {
    pub fn new(min: u64, max: u64, theta: f64) -> Self {
        debug_assert!(max >= min);
        let item_count = max - min + 1;
        ScrambledZipfianGenerator {
            zipfian: ZipfianGenerator::new(0, item_count - 1, theta),
            min,
            item_count,
            last: min,
        }
    }
}

impl Generator for ScrambledZipfianGenerator {
    fn next(&mut self, rng: &mut SmallRng) -> u64 {
        let rank = self.zipfian.next(rng);
        self.last = self.min + fnv1a_64(rank) % self.item_count;
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }
}

/// Skewed towards the most recently inserted keys: draws a zipfian offset
/// back from the insertion counter's current high-water mark.
pub struct SkewedLatestGenerator {
    basis: Arc<SharedCounter>,
    zipfian: ZipfianGenerator,
    last: u64,
}

impl SkewedLatestGenerator {
    pub fn new(basis: Arc<SharedCounter>, theta: f64) -> Self {
        let max = basis.last();
        SkewedLatestGenerator {
            zipfian: ZipfianGenerator::new(0, max.max(1), theta),
            basis,
            last: 0,
        }
    }
}

impl Generator for SkewedLatestGenerator {
    fn next(&mut self, rng: &mut SmallRng) -> u64 {
        let max = self.basis.last();
        let offset = self.zipfian.next_for(max + 1, rng);
        self.last = max.saturating_sub(offset);
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_for_thread;

    fn frequencies(g: &mut dyn Generator, n: usize, buckets: u64) -> Vec<u64> {
        let mut rng = rng_for_thread(0);
        let mut counts = vec![0u64; buckets as usize];
        for _ in 0..n {
            let v = g.next(&mut rng);
            assert!(v < buckets, "sample {} out of range", v);
            counts[v as usize] += 1;
        }
        counts
    }

    #[test]
    fn test_zipfian_prefers_low_ranks() {
        let mut g = ZipfianGenerator::new(0, 99, 0.99);
        let counts = frequencies(&mut g, 100_000, 100);
        assert!(counts[0] > counts[50]);
        assert!(counts[0] > counts[99]);
        // Rank zero should take a large share under theta close to 1.
        assert!(counts[0] as f64 / 100_000.0 > 0.1);
    }

    #[test]
    fn test_zipfian_stays_in_bounds_after_growth() {
        let mut rng = rng_for_thread(1);
        let mut g = ZipfianGenerator::new(0, 9, 0.99);
        for items in [10u64, 100, 1000] {
            for _ in 0..10_000 {
                let v = g.next_for(items, &mut rng);
                assert!(v < items);
            }
        }
    }

    #[test]
    fn test_scrambled_zipfian_decorates_hot_keys() {
        let mut g = ScrambledZipfianGenerator::new(0, 999, 0.99);
        let counts = frequencies(&mut g, 100_000, 1000);
        let (hottest, _) = counts
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .unwrap();
        // The hottest key lands wherever the hash sends rank zero, not at
        // the low end of the keyspace.
        assert_ne!(hottest, 0);
    }

    #[test]
    fn test_skewed_latest_tracks_counter() {
        let basis = Arc::new(SharedCounter::new(1000));
        let mut g = SkewedLatestGenerator::new(basis.clone(), 0.99);
        let mut rng = rng_for_thread(2);
        let mut near_head = 0;
        for _ in 0..10_000 {
            let v = g.next(&mut rng);
            assert!(v <= 999);
            if v >= 990 {
                near_head += 1;
            }
        }
        assert!(near_head as f64 / 10_000.0 > 0.2);

        // Advancing the counter moves the head of the distribution.
        for _ in 0..1000 {
            basis.next();
        }
        let mut seen_new = false;
        for _ in 0..10_000 {
            if g.next(&mut rng) > 999 {
                seen_new = true;
                break;
            }
        }
        assert!(seen_new);
    }
}
