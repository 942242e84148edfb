mod discrete;
mod zipfian;

pub use discrete::DiscreteGenerator;
pub use zipfian::{ScrambledZipfianGenerator, SkewedLatestGenerator, ZipfianGenerator};

pub mod prelude {
    pub use super::{
        BatchedCounterGenerator, ConstGenerator, DiscreteGenerator, Generator,
        ScrambledZipfianGenerator, SharedCounter, SkewedLatestGenerator, UniformGenerator,
        ZipfianGenerator,
    };
}

use crate::random::urand_int;
use rand::rngs::SmallRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A stream of u64 samples. `next` advances the stream, `last` repeats the
/// most recent sample without advancing.
pub trait Generator: Send {
    fn next(&mut self, rng: &mut SmallRng) -> u64;
    fn last(&self) -> u64;
}

pub struct ConstGenerator {
    value: u64,
}

impl ConstGenerator {
    pub fn new(value: u64) -> Self {
        ConstGenerator { value }
    }
}

impl Generator for ConstGenerator {
    fn next(&mut self, _rng: &mut SmallRng) -> u64 {
        self.value
    }

    fn last(&self) -> u64 {
        self.value
    }
}

pub struct UniformGenerator {
    min: u64,
    max: u64,
    last: u64,
}

impl UniformGenerator {
    /// Uniform over the closed interval [min, max].
    pub fn new(min: u64, max: u64) -> Self {
        debug_assert!(min <= max);
        UniformGenerator { min, max, last: min }
    }
}

impl Generator for UniformGenerator {
    fn next(&mut self, rng: &mut SmallRng) -> u64 {
        self.last = urand_int(rng, self.min, self.max);
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }
}

/// Monotone insertion counter shared between the run-phase insert path and
/// the "latest" request distribution. `last` reports the highest key number
/// whose insertion has been claimed, so readers never chase a key that no
/// writer has started.
pub struct SharedCounter {
    counter: AtomicU64,
}

impl SharedCounter {
    pub fn new(start: u64) -> Self {
        SharedCounter {
            counter: AtomicU64::new(start),
        }
    }

    /// Claims and returns the next key number.
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel)
    }

    /// Highest claimed key number.
    pub fn last(&self) -> u64 {
        self.counter.load(Ordering::Acquire).saturating_sub(1)
    }
}

/// Hands out key numbers in batches claimed from a shared cursor. Threads
/// interleave at batch granularity and never hand out the same number
/// twice. A thread that stops mid-batch strands the tail of that batch, so
/// coverage is dense only up to the last fully consumed batch.
pub struct BatchedCounterGenerator {
    cursor: Arc<AtomicU64>,
    batch_size: u64,
    next: u64,
    remaining: u64,
    last: u64,
}

impl BatchedCounterGenerator {
    pub fn new(start: u64, batch_size: u64) -> Self {
        debug_assert!(batch_size >= 1);
        BatchedCounterGenerator {
            cursor: Arc::new(AtomicU64::new(start)),
            batch_size,
            next: 0,
            remaining: 0,
            last: start,
        }
    }

    /// A handle drawing from the same cursor, for another thread.
    pub fn partition(&self) -> Self {
        BatchedCounterGenerator {
            cursor: self.cursor.clone(),
            batch_size: self.batch_size,
            next: 0,
            remaining: 0,
            last: self.last,
        }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}

impl Generator for BatchedCounterGenerator {
    fn next(&mut self, _rng: &mut SmallRng) -> u64 {
        if self.remaining == 0 {
            self.next = self
                .cursor
                .fetch_add(self.batch_size, Ordering::AcqRel);
            self.remaining = self.batch_size;
        }
        self.last = self.next;
        self.next += 1;
        self.remaining -= 1;
        self.last
    }

    fn last(&self) -> u64 {
        self.last
    }
}
