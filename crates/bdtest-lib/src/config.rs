//! Storage device configuration
//!
//! [`DeviceConfig`] is the handle a test case and the emulated block device
//! receive. It is built from the implicit defines of the current
//! permutation, so every field reflects the geometry and failure behavior
//! being tested.

use crate::defines::{
    DefineError, DefineRegistry, DefineValue, BADBLOCK_BEHAVIOR, BLOCK_COUNT, BLOCK_CYCLES,
    BLOCK_SIZE, CACHE_SIZE, ERASE_CYCLES, ERASE_VALUE, LOOKAHEAD_SIZE, POWERLOSS_BEHAVIOR,
    PROG_SIZE, READ_SIZE,
};

/// What the emulated device does with a block that wore out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum BadBlockBehavior {
    /// Programs fail with a corruption error.
    ProgError = 0,
    /// Erases fail with a corruption error.
    EraseError = 1,
    /// Reads fail with a corruption error.
    ReadError = 2,
    /// Programs silently do nothing.
    ProgNoop = 3,
    /// Erases silently do nothing.
    EraseNoop = 4,
}

impl TryFrom<DefineValue> for BadBlockBehavior {
    type Error = DefineValue;

    fn try_from(value: DefineValue) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ProgError),
            1 => Ok(Self::EraseError),
            2 => Ok(Self::ReadError),
            3 => Ok(Self::ProgNoop),
            4 => Ok(Self::EraseNoop),
            other => Err(other),
        }
    }
}

/// What happens to in-flight programs when power is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum PowerLossBehavior {
    /// The interrupted program is lost entirely.
    Noop = 0,
    /// Some bits of the interrupted program land.
    SomeBits = 1,
    /// Most bits of the interrupted program land.
    MostBits = 2,
    /// Writes since the last sync land in arbitrary order.
    OutOfOrder = 3,
}

impl TryFrom<DefineValue> for PowerLossBehavior {
    type Error = DefineValue;

    fn try_from(value: DefineValue) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Noop),
            1 => Ok(Self::SomeBits),
            2 => Ok(Self::MostBits),
            3 => Ok(Self::OutOfOrder),
            other => Err(other),
        }
    }
}

/// Geometry and failure behavior of the device under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub read_size: u32,
    pub prog_size: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub cache_size: u32,
    pub lookahead_size: u32,
    /// Erase cycles before the filesystem relocates a block, -1 to disable.
    pub block_cycles: i32,
    /// Byte an erased block reads back as, -1 to skip erase emulation.
    pub erase_value: i32,
    /// Erases a block survives before going bad, 0 for unlimited.
    pub erase_cycles: u32,
    pub badblock_behavior: BadBlockBehavior,
    pub powerloss_behavior: PowerLossBehavior,
}

impl DeviceConfig {
    /// Build the configuration from the registry's current permutation.
    pub fn from_defines(reg: &mut DefineRegistry) -> Result<Self, DefineError> {
        let badblock = reg.resolve(BADBLOCK_BEHAVIOR)?;
        let powerloss = reg.resolve(POWERLOSS_BEHAVIOR)?;

        Ok(Self {
            read_size: positive(reg, READ_SIZE)?,
            prog_size: positive(reg, PROG_SIZE)?,
            block_size: positive(reg, BLOCK_SIZE)?,
            block_count: positive(reg, BLOCK_COUNT)?,
            cache_size: positive(reg, CACHE_SIZE)?,
            lookahead_size: positive(reg, LOOKAHEAD_SIZE)?,
            block_cycles: ranged(reg, BLOCK_CYCLES, -1, i32::MAX as i64)? as i32,
            erase_value: ranged(reg, ERASE_VALUE, -1, 0xff)? as i32,
            erase_cycles: ranged(reg, ERASE_CYCLES, 0, u32::MAX as i64)? as u32,
            badblock_behavior: BadBlockBehavior::try_from(badblock)
                .map_err(|v| invalid(reg, BADBLOCK_BEHAVIOR, format!("unknown behavior {}", v)))?,
            powerloss_behavior: PowerLossBehavior::try_from(powerloss)
                .map_err(|v| invalid(reg, POWERLOSS_BEHAVIOR, format!("unknown behavior {}", v)))?,
        })
    }

    /// Total device size in bytes.
    pub fn size(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }

    /// Check the relationships between sizes a filesystem relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size % self.read_size != 0 {
            return Err(format!(
                "block_size {} is not a multiple of read_size {}",
                self.block_size, self.read_size
            ));
        }
        if self.block_size % self.prog_size != 0 {
            return Err(format!(
                "block_size {} is not a multiple of prog_size {}",
                self.block_size, self.prog_size
            ));
        }
        if self.cache_size % self.read_size != 0 || self.cache_size % self.prog_size != 0 {
            return Err(format!(
                "cache_size {} is not a multiple of read_size {} and prog_size {}",
                self.cache_size, self.read_size, self.prog_size
            ));
        }
        Ok(())
    }
}

fn invalid(reg: &DefineRegistry, index: usize, reason: String) -> DefineError {
    DefineError::Invalid {
        name: reg.name(index).unwrap_or("?").to_string(),
        reason,
    }
}

fn positive(reg: &mut DefineRegistry, index: usize) -> Result<u32, DefineError> {
    ranged(reg, index, 1, u32::MAX as i64).map(|v| v as u32)
}

fn ranged(
    reg: &mut DefineRegistry,
    index: usize,
    min: DefineValue,
    max: DefineValue,
) -> Result<DefineValue, DefineError> {
    let value = reg.resolve(index)?;
    if value < min || value > max {
        return Err(invalid(
            reg,
            index,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(value)
}
