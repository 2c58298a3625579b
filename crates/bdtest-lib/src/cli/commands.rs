use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::overrides::DefineOverride;
use crate::powerloss::PowerLossSchedule;
use crate::runner::{RunOptions, TestId};

/// bdtest - Permutation runner for block-device test suites
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Optional log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Settings file (TOML); command-line flags take precedence
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List suites and cases with their permutation counts
    List {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Show the resolved defines of every selected permutation
    Defines {
        #[command(flatten)]
        args: RunArgs,
    },

    /// List the built-in geometries
    Geometries,

    /// Run the selected tests
    ///
    /// Every permutation of every selected case runs once, reentrant cases
    /// are rerun across power losses according to the power-loss schedule.
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
}

/// Selection and permutation flags shared by the subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Tests to select: SUITE, SUITE/CASE or SUITE/CASE:PERM (default: all)
    #[arg(value_name = "TEST_ID")]
    pub tests: Vec<TestId>,

    /// Override a define, e.g. -D READ_SIZE=1,16 or -D N=range(4)
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUES")]
    pub defines: Vec<DefineOverride>,

    /// Geometry to test (default, eeprom, emmc, nor, nand or all)
    #[arg(short = 'G', long = "geometry", value_name = "NAME")]
    pub geometries: Vec<String>,

    /// Power-loss schedule for reentrant cases: none, linear, log, random,
    /// random(N) or an explicit list like {1,2,3}
    #[arg(short = 'P', long, value_name = "SCHEDULE")]
    pub powerloss: Option<PowerLossSchedule>,

    /// Seed for the pseudo-random state of each permutation
    #[arg(long, short)]
    pub seed: Option<u32>,
}

impl RunArgs {
    /// Apply the flags on top of options loaded from a settings file.
    pub fn apply(&self, options: &mut RunOptions) {
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if !self.geometries.is_empty() {
            options.geometries = self.geometries.clone();
        }
        if let Some(powerloss) = &self.powerloss {
            options.powerloss = powerloss.clone();
        }
        options
            .overrides
            .extend(self.defines.iter().cloned().collect());
    }
}
