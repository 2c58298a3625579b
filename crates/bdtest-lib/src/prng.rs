//! Deterministic pseudo-random numbers for tests
//!
//! The generator is a plain xorshift32. State is a single `u32` owned by the
//! caller and threaded through every call, so two runs seeded alike produce
//! identical sequences on every platform. It is not cryptographic.
//!
//! # Example
//!
//! ```
//! use bdtest_lib::prng::prng;
//!
//! let mut a = 42;
//! let mut b = 42;
//! assert_eq!(prng(&mut a), prng(&mut b));
//! assert_eq!(a, b);
//! ```

/// Seed used when none is configured.
pub const DEFAULT_SEED: u32 = 42;

/// Advance `state` and return the new value.
///
/// A zero state is a fixed point and stays zero; seed through
/// [`permutation_seed`] to avoid it.
#[inline]
pub fn prng(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

/// Fill `buf` with pseudo-random bytes, one generator step per byte.
pub fn fill_bytes(state: &mut u32, buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = (prng(state) & 0xff) as u8;
    }
}

/// Draw a value in `0..bound`. Returns 0 for a zero bound.
pub fn below(state: &mut u32, bound: u32) -> u32 {
    if bound == 0 {
        return 0;
    }
    prng(state) % bound
}

/// Derive a fresh, nonzero seed for one permutation of a run.
///
/// Each permutation gets its own starting state so results do not depend on
/// which permutations ran before it.
pub fn permutation_seed(seed: u32, perm: usize) -> u32 {
    let mut state = seed ^ (perm as u32).wrapping_mul(0x9e37_79b9);
    if state == 0 {
        state = DEFAULT_SEED;
    }
    // a few rounds to spread nearby permutation indices apart
    for _ in 0..3 {
        prng(&mut state);
    }
    state
}
