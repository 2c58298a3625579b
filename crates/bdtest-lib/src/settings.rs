//! Runner settings file
//!
//! Settings are read from a TOML file and turned into [`RunOptions`].
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! seed = 1234
//! geometries = ["default", "nor"]
//! powerloss = "linear"
//!
//! [defines]
//! BLOCK_CYCLES = -1
//! READ_SIZE = [1, 16]
//! N = "range(4),8"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defines::DefineValue;
use crate::geometry::{self, GeometryError};
use crate::overrides::{DefineOverride, OverrideError, OverrideSet};
use crate::powerloss::{PowerLossError, PowerLossSchedule};
use crate::runner::RunOptions;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Override error: {0}")]
    Override(#[from] OverrideError),

    #[error("Power-loss error: {0}")]
    PowerLoss(#[from] PowerLossError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Value of one entry in the `[defines]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    One(DefineValue),
    Many(Vec<DefineValue>),
    /// Same syntax as the VALUES part of `-D NAME=VALUES`.
    Expr(String),
}

impl OverrideValue {
    fn to_override(&self, name: &str) -> Result<DefineOverride, OverrideError> {
        match self {
            OverrideValue::One(v) => DefineOverride::new(name, vec![*v]),
            OverrideValue::Many(vs) => DefineOverride::new(name, vs.clone()),
            OverrideValue::Expr(expr) => DefineOverride::parse_values(name, expr),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub seed: Option<u32>,
    pub geometries: Vec<String>,
    pub powerloss: Option<String>,
    pub defines: BTreeMap<String, OverrideValue>,
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        debug!("Settings::load: path={}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Write settings to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate and convert into run options. Unset fields take the
    /// defaults.
    pub fn to_options(&self) -> Result<RunOptions, SettingsError> {
        let mut options = RunOptions::default();

        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if !self.geometries.is_empty() {
            geometry::find_all(self.geometries.as_slice())?;
            options.geometries = self.geometries.clone();
        }
        if let Some(powerloss) = &self.powerloss {
            options.powerloss = powerloss.parse::<PowerLossSchedule>()?;
        }
        options.overrides = self
            .defines
            .iter()
            .map(|(name, value)| value.to_override(name))
            .collect::<Result<OverrideSet, _>>()?;

        Ok(options)
    }
}
