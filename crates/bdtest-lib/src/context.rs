//! What a running test case sees
//!
//! A case's `run` receives a [`TestContext`]: the device configuration for
//! the current permutation, access to the remaining defines, a PRNG state,
//! the persisted disk image and the power-loss hook the emulated device
//! calls on every program or erase.

use thiserror::Error;

use crate::config::DeviceConfig;
use crate::defines::{DefineError, DefineRegistry, DefineValue};
use crate::prng;

/// Failure of a single test run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    #[error("{file}:{line}:assert: {message}")]
    Assertion {
        file: &'static str,
        line: u32,
        message: String,
    },

    #[error("Power lost")]
    PowerLoss,

    #[error(transparent)]
    Define(#[from] DefineError),

    #[error("{0}")]
    Failed(String),
}

/// Fail the current test with file and line unless `cond` holds.
///
/// ```
/// use bdtest_lib::{test_assert, TestError};
///
/// fn check(n: u32) -> Result<(), TestError> {
///     test_assert!(n % 2 == 0, "{} is odd", n);
///     Ok(())
/// }
///
/// assert!(check(4).is_ok());
/// assert!(matches!(check(3), Err(TestError::Assertion { .. })));
/// ```
#[macro_export]
macro_rules! test_assert {
    ($cond:expr) => {
        $crate::test_assert!($cond, "assertion failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::TestError::Assertion {
                file: file!(),
                line: line!(),
                message: format!($($arg)+),
            });
        }
    };
}

/// Per-invocation state handed to a case's `run`.
pub struct TestContext<'a> {
    cfg: &'a DeviceConfig,
    defines: &'a mut DefineRegistry,
    disk: &'a mut Vec<u8>,
    prng: u32,
    remaining_cycles: Option<u64>,
    powerlosses: u32,
}

impl<'a> TestContext<'a> {
    /// Build a context.
    ///
    /// `cut` is the number of power cycles after which power is lost, or
    /// `None` to run without interruption. `powerlosses` counts the cuts
    /// that already happened in this permutation.
    pub fn new(
        cfg: &'a DeviceConfig,
        defines: &'a mut DefineRegistry,
        disk: &'a mut Vec<u8>,
        seed: u32,
        cut: Option<u64>,
        powerlosses: u32,
    ) -> Self {
        Self {
            cfg,
            defines,
            disk,
            prng: seed,
            remaining_cycles: cut,
            powerlosses,
        }
    }

    /// Configuration of the device under test.
    pub fn cfg(&self) -> &DeviceConfig {
        self.cfg
    }

    /// Resolve a define of the current permutation.
    pub fn define(&mut self, index: usize) -> Result<DefineValue, DefineError> {
        self.defines.resolve(index)
    }

    /// Resolve a define by name.
    pub fn define_named(&mut self, name: &str) -> Result<DefineValue, DefineError> {
        self.defines.resolve_named(name)
    }

    /// Next pseudo-random value.
    ///
    /// The state restarts from the permutation's seed on every invocation,
    /// so a reentrant case regenerates the same data after each power loss.
    pub fn prng(&mut self) -> u32 {
        prng::prng(&mut self.prng)
    }

    /// Fill `buf` with pseudo-random bytes.
    pub fn fill_random(&mut self, buf: &mut [u8]) {
        prng::fill_bytes(&mut self.prng, buf)
    }

    /// The disk image, carried across power losses within a permutation.
    pub fn disk(&mut self) -> &mut Vec<u8> {
        &mut *self.disk
    }

    /// Power losses that already happened in this permutation.
    pub fn powerlosses(&self) -> u32 {
        self.powerlosses
    }

    /// Whether this invocation is running without a pending power cut.
    pub fn is_uninterrupted(&self) -> bool {
        self.remaining_cycles.is_none()
    }

    /// Count one program or erase cycle.
    ///
    /// Fails with [`TestError::PowerLoss`] on the cycle the power cut was
    /// scheduled for and on every cycle after it.
    pub fn power_cycle(&mut self) -> Result<(), TestError> {
        match self.remaining_cycles {
            None => Ok(()),
            Some(0) | Some(1) => {
                self.remaining_cycles = Some(0);
                Err(TestError::PowerLoss)
            }
            Some(n) => {
                self.remaining_cycles = Some(n - 1);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for TestContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("cfg", &self.cfg)
            .field("disk_len", &self.disk.len())
            .field("remaining_cycles", &self.remaining_cycles)
            .field("powerlosses", &self.powerlosses)
            .finish_non_exhaustive()
    }
}
