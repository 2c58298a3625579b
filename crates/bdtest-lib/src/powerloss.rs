//! Power-loss schedules for reentrant cases
//!
//! A schedule yields the cut points for successive invocations of a
//! reentrant case. A cut point `n` means power is lost on the `n`-th program
//! or erase of that invocation. The run driver keeps invoking the case, with
//! the disk image carried over, until an invocation finishes before its cut
//! point or the schedule runs out. A schedule that runs out is followed by
//! one invocation without a cut, so every schedule terminates.

use std::str::FromStr;

use thiserror::Error;

use crate::prng;

/// Upper bound on randomly drawn cut points when none is given.
pub const DEFAULT_RANDOM_MAX: u64 = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowerLossError {
    #[error("Unknown power-loss schedule: {0:?}")]
    Unknown(String),

    #[error("Invalid cut point {0:?}")]
    InvalidCut(String),
}

/// When to cut power while rerunning a reentrant case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PowerLossSchedule {
    /// Run once without power loss.
    #[default]
    None,
    /// Cut after 1, 2, 3, ... cycles.
    Linear,
    /// Cut after 1, 2, 4, 8, ... cycles.
    Log,
    /// Cut after a pseudo-random number of cycles in `1..=max`, at most
    /// `max` times, then run once more uninterrupted.
    Random { max: u64 },
    /// Cut at the listed cycles, then run once more uninterrupted.
    Explicit(Vec<u64>),
}

impl PowerLossSchedule {
    pub fn is_none(&self) -> bool {
        matches!(self, PowerLossSchedule::None)
    }

    /// Cut points for one permutation. `seed` drives the random schedule.
    pub fn cut_points(&self, seed: u32) -> CutPoints<'_> {
        CutPoints {
            schedule: self,
            step: 0,
            prng: if seed == 0 { prng::DEFAULT_SEED } else { seed },
        }
    }
}

impl FromStr for PowerLossSchedule {
    type Err = PowerLossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "none" | "off" => return Ok(Self::None),
            "linear" => return Ok(Self::Linear),
            "log" => return Ok(Self::Log),
            "random" => {
                return Ok(Self::Random {
                    max: DEFAULT_RANDOM_MAX,
                })
            }
            _ => {}
        }

        if let Some(max) = s
            .strip_prefix("random(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let max = parse_cut(max)?;
            return Ok(Self::Random { max });
        }

        let list = s
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(s);
        if list.is_empty() || !list.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(PowerLossError::Unknown(s.to_string()));
        }
        let cuts = list
            .split(',')
            .map(parse_cut)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Explicit(cuts))
    }
}

impl std::fmt::Display for PowerLossSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Linear => f.write_str("linear"),
            Self::Log => f.write_str("log"),
            Self::Random { max } => write!(f, "random({})", max),
            Self::Explicit(cuts) => {
                let cuts: Vec<String> = cuts.iter().map(|c| c.to_string()).collect();
                write!(f, "{{{}}}", cuts.join(","))
            }
        }
    }
}

fn parse_cut(s: &str) -> Result<u64, PowerLossError> {
    match s.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(PowerLossError::InvalidCut(s.trim().to_string())),
    }
}

/// Iterator over the cut points of a schedule.
///
/// `None`, exhausted explicit schedules and random schedules after `max`
/// cuts end the iteration; the driver then runs the case once more without
/// a cut.
#[derive(Debug, Clone)]
pub struct CutPoints<'a> {
    schedule: &'a PowerLossSchedule,
    step: u32,
    prng: u32,
}

impl Iterator for CutPoints<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let step = self.step;
        self.step = self.step.saturating_add(1);
        match self.schedule {
            PowerLossSchedule::None => None,
            PowerLossSchedule::Linear => Some(step as u64 + 1),
            PowerLossSchedule::Log => Some(1u64.checked_shl(step).unwrap_or(u64::MAX)),
            PowerLossSchedule::Random { max } => {
                let max = (*max).max(1);
                if step as u64 >= max {
                    return None;
                }
                let draw = ((prng::prng(&mut self.prng) as u64) << 32)
                    | prng::prng(&mut self.prng) as u64;
                Some(1 + draw % max)
            }
            PowerLossSchedule::Explicit(cuts) => cuts.get(step as usize).copied(),
        }
    }
}
