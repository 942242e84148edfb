use rand::distr::uniform::SampleUniform;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use std::ops::Index;

pub const SEED_MULTIPLIER: u64 = 3_423_452_437;
pub const SEED_OFFSET: u64 = 8_349_344_563_457;

/// Deterministic per-worker rng. Two runs with the same thread count and
/// parameters produce the same operation streams.
pub fn rng_for_thread(thread_index: u64) -> SmallRng {
    SmallRng::seed_from_u64(
        thread_index
            .wrapping_mul(SEED_MULTIPLIER)
            .wrapping_add(SEED_OFFSET),
    )
}

/// Uniform sample in the closed range [x, y].
pub fn urand_int<T>(rng: &mut SmallRng, x: T, y: T) -> T
where
    T: SampleUniform + PartialOrd + Copy,
{
    rng.random_range(x..=y)
}

/// Uniform sample in [min, max] scaled down by `divisor`.
pub fn urand_double(rng: &mut SmallRng, min: u64, max: u64, divisor: u64) -> f64 {
    urand_int(rng, min, max) as f64 / divisor as f64
}

/// Uniform sample in [0, 1).
pub fn rand_f64(rng: &mut SmallRng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

const ALNUM: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random alphanumeric string with a length drawn from [min_len, max_len].
pub fn rand_astring(rng: &mut SmallRng, min_len: usize, max_len: usize) -> String {
    let len = urand_int(rng, min_len, max_len);
    (0..len)
        .map(|_| ALNUM[rng.random_range(0..ALNUM.len())] as char)
        .collect()
}

/// Random numeric string with a length drawn from [min_len, max_len].
pub fn rand_nstring(rng: &mut SmallRng, min_len: usize, max_len: usize) -> String {
    let len = urand_int(rng, min_len, max_len);
    (0..len)
        .map(|_| rng.random_range(b'0'..=b'9') as char)
        .collect()
}

pub const FNV_OFFSET_BASIS_64: u64 = 0xCBF2_9CE4_8422_2325;
pub const FNV_PRIME_64: u64 = 1_099_511_628_211;

/// FNV-1a over the eight octets of a u64, low octet first.
pub fn fnv1a_64(mut val: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS_64;
    for _ in 0..8 {
        let octet = val & 0xff;
        val >>= 8;
        hash ^= octet;
        hash = hash.wrapping_mul(FNV_PRIME_64);
    }
    hash
}

/// Random permutation of the integers in [min, max].
pub struct Permutation {
    perm: Vec<usize>,
}

impl Permutation {
    pub fn new(rng: &mut SmallRng, min: usize, max: usize) -> Self {
        debug_assert!(min <= max);
        let mut perm: Vec<usize> = (min..=max).collect();
        let size = perm.len();
        for i in 0..size - 1 {
            let j = rng.random_range(0..size - i);
            if j > 0 {
                perm.swap(i, i + j);
            }
        }
        Permutation { perm }
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }
}

impl Index<usize> for Permutation {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.perm[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_elements() {
        let mut rng = rng_for_thread(0);
        let perm = Permutation::new(&mut rng, 1, 10);
        let mut elements = Vec::new();
        for i in 0..perm.len() {
            elements.push(perm[i]);
        }
        elements.sort();
        assert_eq!(elements, (1..=10).collect::<Vec<usize>>());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = rng_for_thread(3);
        let mut b = rng_for_thread(3);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(rng_for_thread(3).next_u64(), rng_for_thread(4).next_u64());
    }

    #[test]
    fn test_fnv1a_is_stable() {
        // Key formatting relies on the hash being a pure function.
        assert_eq!(fnv1a_64(123_456_789), fnv1a_64(123_456_789));
        assert_ne!(fnv1a_64(1), fnv1a_64(2));
    }

    #[test]
    fn test_rand_f64_range() {
        let mut rng = rng_for_thread(1);
        for _ in 0..10_000 {
            let v = rand_f64(&mut rng);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_string_lengths() {
        let mut rng = rng_for_thread(2);
        for _ in 0..100 {
            let s = rand_astring(&mut rng, 26, 50);
            assert!((26..=50).contains(&s.len()));
            let n = rand_nstring(&mut rng, 24, 24);
            assert_eq!(n.len(), 24);
            assert!(n.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
