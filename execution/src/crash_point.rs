//! Crash point derivation.
//!
//! A round's crash point is a pure function of its seed pair:
//!
//! ```text
//! seed  = fnv1a32("{server}:{client}")
//! u     = clamp(mulberry32(seed).next(), 1e-6, 0.9999)
//! crash = max(1.01, 1 / (1 - u))
//! crash = min(crash, 25 + mulberry32(seed).next() * 20)
//! ```
//!
//! The `1 / (1 - u)` shape is heavy tailed and concentrates mass at low multipliers;
//! the second draw puts a ceiling somewhere in `[25, 45)`. Anyone holding the seed pair
//! can recompute the result with [`choose`].

use crash_types::SeedPair;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Smallest crash point a round can have.
pub const MIN_CRASH_POINT: f64 = 1.01;

/// Largest crash point a round can have.
pub const MAX_CRASH_POINT: f64 = 45.0;

const U_MIN: f64 = 1e-6;
const U_MAX: f64 = 0.9999;
const CAP_BASE: f64 = 25.0;
const CAP_SPREAD: f64 = 20.0;

const SEED_LEN: usize = 8;
const SEED_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 32-bit FNV-1a over the UTF-16 code units of `input`.
///
/// Hashing code units rather than UTF-8 bytes keeps results identical to clients that
/// hash JavaScript strings. For ASCII seeds the two are the same.
pub fn fnv1a32(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for unit in input.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Mulberry32: a tiny 32-bit generator. Fast, seedable, and reproducible everywhere.
#[derive(Clone, Debug)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value, uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }
}

/// Crash point for a seed pair. Always within `[MIN_CRASH_POINT, MAX_CRASH_POINT]`.
pub fn choose(server_seed: &str, client_seed: &str) -> f64 {
    let mut rng = Mulberry32::new(fnv1a32(&format!("{server_seed}:{client_seed}")));
    let u = rng.next_f64().clamp(U_MIN, U_MAX);
    let crash = (1.0 / (1.0 - u)).max(MIN_CRASH_POINT);
    let cap = CAP_BASE + rng.next_f64() * CAP_SPREAD;
    crash.min(cap)
}

/// Crash point for a [`SeedPair`].
pub fn choose_for(seeds: &SeedPair) -> f64 {
    choose(&seeds.server, &seeds.client)
}

/// Draw a fresh seed pair of short lowercase base-36 strings.
pub fn generate_seed_pair<R: Rng + ?Sized>(rng: &mut R) -> SeedPair {
    SeedPair {
        server: generate_seed(rng),
        client: generate_seed(rng),
    }
}

fn generate_seed<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SEED_LEN)
        .map(|_| SEED_ALPHABET[rng.gen_range(0..SEED_ALPHABET.len())] as char)
        .collect()
}

/// Supplies the seed pair and crash point for each new round.
///
/// Rounds call this exactly once per reset, never mid-round.
pub trait CrashSource: Send {
    fn next_round(&mut self) -> (SeedPair, f64);
}

/// Production source: fresh random seeds, crash point derived with [`choose`].
pub struct RandomSeeds<R> {
    rng: R,
}

impl<R: Rng + Send> RandomSeeds<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSeeds<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng + Send> CrashSource for RandomSeeds<R> {
    fn next_round(&mut self) -> (SeedPair, f64) {
        let seeds = generate_seed_pair(&mut self.rng);
        let crash_point = choose_for(&seeds);
        (seeds, crash_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fnv1a32_reference_values() {
        assert_eq!(fnv1a32(""), 0x811c_9dc5);
        assert_eq!(fnv1a32("a"), 3_826_002_220);
        assert_eq!(fnv1a32("abc:def"), 3_584_721_650);
    }

    #[test]
    fn test_mulberry32_reference_stream() {
        let mut rng = Mulberry32::new(42);
        let expected = [0.6011037519201636, 0.44829055899754167, 0.8524657934904099];
        for value in expected {
            assert!((rng.next_f64() - value).abs() < 1e-12);
        }
    }

    #[test]
    fn test_choose_reference_values() {
        let cases = [
            (("abc", "def"), 1.5983816605952959),
            (("server", "client"), 1.121117441187926),
            (("a1b2c3d4", "e5f6g7h8"), 1.2204867517082376),
        ];
        for ((server, client), expected) in cases {
            let got = choose(server, client);
            assert!((got - expected).abs() < 1e-9, "{server}:{client} -> {got}");
        }
    }

    #[test]
    fn test_seed_pair_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let seeds = generate_seed_pair(&mut rng);
        for seed in [&seeds.server, &seeds.client] {
            assert_eq!(seed.len(), SEED_LEN);
            assert!(seed.bytes().all(|b| SEED_ALPHABET.contains(&b)));
        }
        assert_ne!(seeds.server, seeds.client);
    }

    #[test]
    fn test_random_seeds_reproducible_from_rng() {
        let mut a = RandomSeeds::new(StdRng::seed_from_u64(99));
        let mut b = RandomSeeds::new(StdRng::seed_from_u64(99));
        for _ in 0..5 {
            let (seeds_a, crash_a) = a.next_round();
            let (seeds_b, crash_b) = b.next_round();
            assert_eq!(seeds_a, seeds_b);
            assert_eq!(crash_a, crash_b);
            assert_eq!(crash_a, choose_for(&seeds_a));
        }
    }

    #[test]
    fn test_distribution_favors_low_multipliers() {
        let mut source = RandomSeeds::new(StdRng::seed_from_u64(1));
        let samples: Vec<f64> = (0..2_000).map(|_| source.next_round().1).collect();
        let below_two = samples.iter().filter(|crash| **crash < 2.0).count();
        assert!(below_two > samples.len() / 3, "only {below_two} samples below 2x");
        assert!(samples.iter().all(|crash| *crash <= MAX_CRASH_POINT));
    }

    proptest! {
        #[test]
        fn prop_choose_deterministic_and_bounded(server in ".{0,16}", client in ".{0,16}") {
            let first = choose(&server, &client);
            let second = choose(&server, &client);
            prop_assert_eq!(first, second);
            prop_assert!(first >= MIN_CRASH_POINT);
            prop_assert!(first <= MAX_CRASH_POINT);
        }

        #[test]
        fn prop_mulberry32_unit_interval(seed in any::<u32>()) {
            let mut rng = Mulberry32::new(seed);
            for _ in 0..8 {
                let value = rng.next_f64();
                prop_assert!((0.0..1.0).contains(&value));
            }
        }
    }
}
