//! User define overrides
//!
//! Overrides come from the command line (`-D NAME=VALUES`) or the settings
//! file and take precedence over everything a case declares. VALUES is a
//! comma-separated list of integers and ranges:
//!
//! ```text
//! BLOCK_CYCLES=-1
//! READ_SIZE=1,16,0x40
//! N=range(4),range(8,32,8)
//! ```
//!
//! An override with several values becomes its own permutation axis.

use std::str::FromStr;

use thiserror::Error;

use crate::defines::DefineValue;
use crate::permutation::Axis;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverrideError {
    #[error("Expected NAME=VALUES, got {0:?}")]
    MissingEquals(String),

    #[error("Empty define name in {0:?}")]
    EmptyName(String),

    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: String, value: String },

    #[error("Invalid range {range:?} for {name}: {reason}")]
    InvalidRange {
        name: String,
        range: String,
        reason: String,
    },

    #[error("No values given for {0}")]
    NoValues(String),

    #[error("Unknown define {0}")]
    UnknownDefine(String),
}

/// One `NAME=VALUES` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineOverride {
    pub name: String,
    pub values: Vec<DefineValue>,
}

impl DefineOverride {
    pub fn new(name: impl Into<String>, values: Vec<DefineValue>) -> Result<Self, OverrideError> {
        let name = name.into();
        if values.is_empty() {
            return Err(OverrideError::NoValues(name));
        }
        Ok(Self { name, values })
    }

    /// Parse the VALUES part of an override for `name`.
    pub fn parse_values(name: &str, values: &str) -> Result<Self, OverrideError> {
        let mut out = Vec::new();
        for item in split_top_level(values) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if let Some(args) = item
                .strip_prefix("range(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                out.extend(parse_range(name, item, args)?);
            } else {
                out.push(parse_int(item).ok_or_else(|| OverrideError::InvalidValue {
                    name: name.to_string(),
                    value: item.to_string(),
                })?);
            }
        }
        Self::new(name, out)
    }
}

impl FromStr for DefineOverride {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, values) = s
            .split_once('=')
            .ok_or_else(|| OverrideError::MissingEquals(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(OverrideError::EmptyName(s.to_string()));
        }
        Self::parse_values(name, values)
    }
}

impl std::fmt::Display for DefineOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}={}", self.name, values.join(","))
    }
}

/// An ordered set of overrides. A later override of the same name replaces
/// the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    overrides: Vec<DefineOverride>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ov: DefineOverride) {
        match self.overrides.iter_mut().find(|o| o.name == ov.name) {
            Some(existing) => *existing = ov,
            None => self.overrides.push(ov),
        }
    }

    /// Merge `other` on top of `self`.
    pub fn extend(&mut self, other: OverrideSet) {
        for ov in other.overrides {
            self.insert(ov);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefineOverride> {
        self.overrides.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DefineOverride> {
        self.overrides.iter().find(|o| o.name == name)
    }

    /// Names no table in `tables` knows about.
    pub fn unknown(&self, tables: &[&[String]]) -> Vec<&str> {
        self.overrides
            .iter()
            .filter(|o| {
                !tables
                    .iter()
                    .any(|names| names.iter().any(|n| *n == o.name))
            })
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Permutation axes for the overrides that apply to a name table, in
    /// override order. Names outside the table are skipped.
    pub fn axes(&self, names: &[String]) -> Vec<Axis> {
        self.overrides
            .iter()
            .filter_map(|o| {
                let index = names.iter().position(|n| *n == o.name)?;
                Some(Axis::values(index, o.name.clone(), o.values.iter().copied()))
            })
            .collect()
    }
}

impl FromIterator<DefineOverride> for OverrideSet {
    fn from_iter<T: IntoIterator<Item = DefineOverride>>(iter: T) -> Self {
        let mut set = OverrideSet::new();
        for ov in iter {
            set.insert(ov);
        }
        set
    }
}

/// Split on commas that are not inside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Parse a decimal, `0x`, `0o` or `0b` integer, optionally negative.
pub fn parse_int(s: &str) -> Option<DefineValue> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let lower = digits.to_ascii_lowercase();
    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<i64>().ok()?
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn parse_range(name: &str, item: &str, args: &str) -> Result<Vec<DefineValue>, OverrideError> {
    let bad = |reason: &str| OverrideError::InvalidRange {
        name: name.to_string(),
        range: item.to_string(),
        reason: reason.to_string(),
    };

    let nums = args
        .split(',')
        .map(|a| parse_int(a).ok_or_else(|| bad("arguments must be integers")))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, stop, step) = match nums.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(bad("expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(bad("step must not be zero"));
    }

    let mut values = Vec::new();
    let mut v = start;
    while (step > 0 && v < stop) || (step < 0 && v > stop) {
        values.push(v);
        v = match v.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(values)
}
