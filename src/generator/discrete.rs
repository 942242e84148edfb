use crate::random::rand_f64;
use rand::rngs::SmallRng;

/// Weighted chooser over a small set of values. Weights are relative; the
/// draw renormalizes against the running sum so values can be registered
/// with raw proportions.
pub struct DiscreteGenerator<T: Clone> {
    pairs: Vec<(T, f64)>,
    sum: f64,
    last: Option<T>,
}

impl<T: Clone> DiscreteGenerator<T> {
    pub fn new() -> Self {
        DiscreteGenerator {
            pairs: Vec::new(),
            sum: 0.0,
            last: None,
        }
    }

    pub fn add_value(&mut self, value: T, weight: f64) {
        debug_assert!(weight > 0.0);
        if self.pairs.is_empty() {
            // Until the first draw, `last` reports the first registered value.
            self.last = Some(value.clone());
        }
        self.sum += weight;
        self.pairs.push((value, weight));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn next(&mut self, rng: &mut SmallRng) -> T {
        debug_assert!(!self.pairs.is_empty());
        let mut chooser = rand_f64(rng);
        for (value, weight) in &self.pairs[..self.pairs.len() - 1] {
            if chooser < weight / self.sum {
                self.last = Some(value.clone());
                return value.clone();
            }
            chooser -= weight / self.sum;
        }
        let (value, _) = &self.pairs[self.pairs.len() - 1];
        self.last = Some(value.clone());
        value.clone()
    }

    pub fn last(&self) -> Option<T> {
        self.last.clone()
    }
}

impl<T: Clone> Default for DiscreteGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}
