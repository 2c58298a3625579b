pub mod cli;
pub mod config;
pub mod context;
pub mod defines;
pub mod geometry;
pub mod overrides;
pub mod permutation;
pub mod powerloss;
pub mod prng;
pub mod runner;
pub mod settings;
pub mod suite;
pub mod trace;

pub use config::{BadBlockBehavior, DeviceConfig, PowerLossBehavior};
pub use context::{TestContext, TestError};
pub use defines::{Define, DefineError, DefineRegistry, DefineValue, Layer};
pub use permutation::{Axis, PermutationError, Permutations};
pub use runner::{RunError, RunOptions, RunReport, Runner, TestId};
pub use settings::{Settings, SettingsError};
pub use suite::{TestCase, TestFlags, TestSuite};

#[doc(hidden)]
pub use log as __log;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
