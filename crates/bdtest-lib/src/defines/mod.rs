//! Test defines
//!
//! A define is a named integer parameter of a test run: a storage geometry
//! size, an erase behavior, a case-specific knob. Defines are addressed by
//! position in their suite's name table and resolved lazily, either from a
//! constant or from a resolver closure that may read other defines.
//!
//! The eleven implicit defines every suite starts with live in
//! [`IMPLICIT_DEFINES`], in the fixed order code generators rely on.

pub mod registry;

pub use registry::{DefineRegistry, Layer};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{BadBlockBehavior, PowerLossBehavior};

/// Resolved define value.
pub type DefineValue = i64;

/// Signature of a define resolver.
pub type ResolverFn = dyn Fn(&mut DefineRegistry) -> Result<DefineValue, DefineError> + Send + Sync;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefineError {
    #[error("Define index {index} out of range (suite has {count} defines)")]
    OutOfRange { index: usize, count: usize },

    #[error("Define {name} has no value")]
    Undefined { name: String },

    #[error("Cyclic define dependency: {chain}")]
    Cycle { name: String, chain: String },

    #[error("Invalid value for define {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// How a define gets its value within one permutation.
#[derive(Clone)]
pub enum Define {
    /// A fixed value.
    Const(DefineValue),
    /// Computed on first resolve; may resolve other defines.
    Derived(Arc<ResolverFn>),
}

impl Define {
    pub fn constant(value: DefineValue) -> Self {
        Define::Const(value)
    }

    /// Wrap a resolver closure. Data the resolver needs is captured by the
    /// closure.
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&mut DefineRegistry) -> Result<DefineValue, DefineError> + Send + Sync + 'static,
    {
        Define::Derived(Arc::new(f))
    }

    /// The constant value, if this define does not need a resolver.
    pub fn as_const(&self) -> Option<DefineValue> {
        match self {
            Define::Const(v) => Some(*v),
            Define::Derived(_) => None,
        }
    }
}

impl From<DefineValue> for Define {
    fn from(value: DefineValue) -> Self {
        Define::Const(value)
    }
}

impl fmt::Debug for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Define::Const(v) => f.debug_tuple("Const").field(v).finish(),
            Define::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

// Implicit define indices. Generated suites must keep this order.
pub const READ_SIZE: usize = 0;
pub const PROG_SIZE: usize = 1;
pub const BLOCK_SIZE: usize = 2;
pub const BLOCK_COUNT: usize = 3;
pub const CACHE_SIZE: usize = 4;
pub const LOOKAHEAD_SIZE: usize = 5;
pub const BLOCK_CYCLES: usize = 6;
pub const ERASE_VALUE: usize = 7;
pub const ERASE_CYCLES: usize = 8;
pub const BADBLOCK_BEHAVIOR: usize = 9;
pub const POWERLOSS_BEHAVIOR: usize = 10;

pub const IMPLICIT_DEFINE_COUNT: usize = 11;

/// The leading defines that describe physical layout and are usually
/// permuted together.
pub const GEOMETRY_DEFINE_COUNT: usize = 4;

/// An entry of the implicit define table.
#[derive(Debug, Clone, Copy)]
pub struct ImplicitDefine {
    pub index: usize,
    pub name: &'static str,
    pub default: fn(&mut DefineRegistry) -> Result<DefineValue, DefineError>,
}

impl ImplicitDefine {
    pub fn to_define(&self) -> Define {
        Define::Derived(Arc::new(self.default))
    }
}

pub const IMPLICIT_DEFINES: [ImplicitDefine; IMPLICIT_DEFINE_COUNT] = [
    ImplicitDefine { index: READ_SIZE, name: "READ_SIZE", default: default_read_size },
    ImplicitDefine { index: PROG_SIZE, name: "PROG_SIZE", default: default_prog_size },
    ImplicitDefine { index: BLOCK_SIZE, name: "BLOCK_SIZE", default: default_block_size },
    ImplicitDefine { index: BLOCK_COUNT, name: "BLOCK_COUNT", default: default_block_count },
    ImplicitDefine { index: CACHE_SIZE, name: "CACHE_SIZE", default: default_cache_size },
    ImplicitDefine { index: LOOKAHEAD_SIZE, name: "LOOKAHEAD_SIZE", default: default_lookahead_size },
    ImplicitDefine { index: BLOCK_CYCLES, name: "BLOCK_CYCLES", default: default_block_cycles },
    ImplicitDefine { index: ERASE_VALUE, name: "ERASE_VALUE", default: default_erase_value },
    ImplicitDefine { index: ERASE_CYCLES, name: "ERASE_CYCLES", default: default_erase_cycles },
    ImplicitDefine {
        index: BADBLOCK_BEHAVIOR,
        name: "BADBLOCK_BEHAVIOR",
        default: default_badblock_behavior,
    },
    ImplicitDefine {
        index: POWERLOSS_BEHAVIOR,
        name: "POWERLOSS_BEHAVIOR",
        default: default_powerloss_behavior,
    },
];

/// Names of the implicit defines, in index order.
pub fn implicit_names() -> impl Iterator<Item = &'static str> {
    IMPLICIT_DEFINES.iter().map(|d| d.name)
}

/// Look up an implicit define by name.
pub fn implicit_index(name: &str) -> Option<usize> {
    IMPLICIT_DEFINES
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.index)
}

fn default_read_size(reg: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    reg.resolve(PROG_SIZE)
}

fn default_prog_size(reg: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    reg.resolve(BLOCK_SIZE)
}

fn default_block_size(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(0)
}

fn default_block_count(reg: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    let block_size = reg.resolve(BLOCK_SIZE)?;
    if block_size <= 0 {
        return Err(DefineError::Invalid {
            name: "BLOCK_COUNT".to_string(),
            reason: format!("derived from BLOCK_SIZE={}, which must be positive", block_size),
        });
    }
    Ok((1024 * 1024) / block_size)
}

fn default_cache_size(reg: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    let read_size = reg.resolve(READ_SIZE)?;
    let prog_size = reg.resolve(PROG_SIZE)?;
    Ok(64.max(read_size.max(prog_size)))
}

fn default_lookahead_size(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(16)
}

fn default_block_cycles(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(-1)
}

fn default_erase_value(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(0xff)
}

fn default_erase_cycles(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(0)
}

fn default_badblock_behavior(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(BadBlockBehavior::ProgError as DefineValue)
}

fn default_powerloss_behavior(_: &mut DefineRegistry) -> Result<DefineValue, DefineError> {
    Ok(PowerLossBehavior::Noop as DefineValue)
}
