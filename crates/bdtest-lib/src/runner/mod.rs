//! Run driver
//!
//! The [`Runner`] walks the selected suites and cases, enumerates every
//! permutation of each case, installs it into a [`DefineRegistry`], applies
//! the case's filter, builds the [`DeviceConfig`] and invokes the case.
//! Reentrant cases are rerun across simulated power losses according to
//! the configured [`PowerLossSchedule`], with the disk image carried from
//! one invocation to the next.
//!
//! Configuration errors (undefined or cyclic defines, bad permutation
//! counts, invalid device configurations) abort the run. Test failures are
//! recorded in the [`RunReport`] and the run continues with the next
//! permutation.

mod id;
mod plan;
mod report;

pub use id::{TestId, TestIdError};
pub use plan::CasePlan;
pub use report::{Outcome, RunReport, TestResult};

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::config::DeviceConfig;
use crate::context::{TestContext, TestError};
use crate::defines::{DefineError, DefineRegistry, DefineValue};
use crate::geometry::{self, Geometry, GeometryError};
use crate::overrides::OverrideSet;
use crate::permutation::PermutationError;
use crate::powerloss::PowerLossSchedule;
use crate::prng;
use crate::suite::{TestCase, TestFlags, TestSuite};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("{id}: {source}")]
    Define {
        id: TestId,
        #[source]
        source: DefineError,
    },

    #[error("{id}: {source}")]
    Permutation {
        id: TestId,
        #[source]
        source: PermutationError,
    },

    #[error("{id}: invalid device configuration: {reason}")]
    InvalidConfig { id: TestId, reason: String },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Test id error: {0}")]
    Id(#[from] TestIdError),

    #[error("No test matches {0}")]
    NoMatch(String),

    #[error("Unknown define {0} in overrides")]
    UnknownOverride(String),
}

/// Everything about a run that does not come from the suites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub seed: u32,
    /// Geometry names; `all` selects every built-in geometry.
    pub geometries: Vec<String>,
    pub overrides: OverrideSet,
    pub powerloss: PowerLossSchedule,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: prng::DEFAULT_SEED,
            geometries: vec!["default".to_string()],
            overrides: OverrideSet::new(),
            powerloss: PowerLossSchedule::None,
        }
    }
}

/// One listed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInfo {
    pub id: TestId,
    pub path: String,
    pub flags: TestFlags,
    /// Flat permutations, including overrides and geometries.
    pub permutations: usize,
}

/// Resolved defines of one permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationDefines {
    pub id: TestId,
    pub defines: Vec<(String, DefineValue)>,
}

/// A case picked by the selectors, with the permutations to run.
struct Selected<'s> {
    suite: &'s TestSuite,
    case: &'s TestCase,
    /// `None` runs every permutation.
    perms: Option<Vec<usize>>,
}

pub struct Runner<'s> {
    suites: &'s [TestSuite],
    options: RunOptions,
    geometries: Vec<&'static Geometry>,
}

impl<'s> Runner<'s> {
    pub fn new(suites: &'s [TestSuite], options: RunOptions) -> Result<Self, RunError> {
        let geometries = if options.geometries.is_empty() {
            vec![geometry::find("default")?]
        } else {
            geometry::find_all(options.geometries.as_slice())?
        };
        debug!(
            "Runner::new: suites={}, geometries={:?}, seed={}, powerloss={}",
            suites.len(),
            geometries.iter().map(|g| g.name).collect::<Vec<_>>(),
            options.seed,
            options.powerloss
        );
        Ok(Self {
            suites,
            options,
            geometries,
        })
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn geometries(&self) -> &[&'static Geometry] {
        &self.geometries
    }

    /// Run every permutation the selectors cover. No selectors runs
    /// everything.
    pub fn run(&self, selectors: &[TestId]) -> Result<RunReport, RunError> {
        let selected = self.select(selectors)?;
        let mut report = RunReport::new();
        for sel in &selected {
            self.run_case(sel, &mut report)?;
        }
        info!("Runner::run: {}", report);
        Ok(report)
    }

    /// The selected cases with their flat permutation counts.
    pub fn list(&self, selectors: &[TestId]) -> Result<Vec<CaseInfo>, RunError> {
        let mut out = Vec::new();
        for sel in self.select(selectors)? {
            let plan = self.plan(&sel)?;
            out.push(CaseInfo {
                id: TestId::case(sel.suite.name(), sel.case.name()),
                path: sel.case.path().to_string(),
                flags: sel.case.flags(),
                permutations: plan.count(),
            });
        }
        Ok(out)
    }

    /// The resolved defines of every selected permutation.
    pub fn defines(&self, selectors: &[TestId]) -> Result<Vec<PermutationDefines>, RunError> {
        let mut out = Vec::new();
        for sel in self.select(selectors)? {
            let plan = self.plan(&sel)?;
            let mut reg = sel.suite.registry();
            for perm in sel.perm_indices(plan.count()) {
                let id = TestId::case(sel.suite.name(), sel.case.name()).with_perm(perm);
                plan.install(&mut reg, perm)
                    .map_err(|source| RunError::Permutation {
                        id: id.clone(),
                        source,
                    })?;
                let defines = reg.snapshot().map_err(|source| RunError::Define {
                    id: id.clone(),
                    source,
                })?;
                out.push(PermutationDefines { id, defines });
            }
        }
        Ok(out)
    }

    fn select(&self, selectors: &[TestId]) -> Result<Vec<Selected<'s>>, RunError> {
        let mut selected = Vec::new();
        let mut matched = vec![false; selectors.len()];

        for suite in self.suites {
            for case in suite.cases() {
                if selectors.is_empty() {
                    selected.push(Selected {
                        suite,
                        case,
                        perms: None,
                    });
                    continue;
                }

                let mut perms = Some(Vec::new());
                let mut hit = false;
                for (i, sel) in selectors.iter().enumerate() {
                    if !sel.matches_case(suite.name(), case.name()) {
                        continue;
                    }
                    matched[i] = true;
                    hit = true;
                    perms = match (sel.perm, perms.take()) {
                        (Some(p), Some(mut list)) => {
                            list.push(p);
                            Some(list)
                        }
                        _ => None,
                    };
                }
                if hit {
                    if let Some(list) = perms.as_mut() {
                        list.sort_unstable();
                        list.dedup();
                    }
                    selected.push(Selected { suite, case, perms });
                }
            }
        }

        if let Some(i) = matched.iter().position(|m| !m) {
            return Err(RunError::NoMatch(selectors[i].to_string()));
        }

        let mut tables: Vec<&[String]> = Vec::new();
        for sel in &selected {
            if !tables.iter().any(|t| std::ptr::eq(*t, sel.suite.define_names())) {
                tables.push(sel.suite.define_names());
            }
        }
        if !selected.is_empty() {
            if let Some(name) = self.options.overrides.unknown(&tables).first() {
                return Err(RunError::UnknownOverride(name.to_string()));
            }
        }

        Ok(selected)
    }

    fn plan(&self, sel: &Selected<'_>) -> Result<CasePlan, RunError> {
        CasePlan::new(
            sel.case,
            sel.suite.define_names(),
            &self.options.overrides,
            &self.geometries,
        )
        .map_err(|source| RunError::Permutation {
            id: TestId::case(sel.suite.name(), sel.case.name()),
            source,
        })
    }

    fn run_case(&self, sel: &Selected<'_>, report: &mut RunReport) -> Result<(), RunError> {
        let plan = self.plan(sel)?;
        info!(
            "Runner::run_case: id={}/{}, permutations={}, flags={}",
            sel.suite.name(),
            sel.case.name(),
            plan.count(),
            sel.case.flags()
        );

        let mut reg = sel.suite.registry();
        for perm in sel.perm_indices(plan.count()) {
            let id = TestId::case(sel.suite.name(), sel.case.name()).with_perm(perm);
            let outcome = self.run_permutation(&plan, sel.case, &mut reg, &id)?;
            if let Outcome::Failed { error, .. } = &outcome {
                warn!("{} failed: {}", id, error);
            }
            report.record(id, outcome);
        }
        Ok(())
    }

    fn run_permutation(
        &self,
        plan: &CasePlan,
        case: &TestCase,
        reg: &mut DefineRegistry,
        id: &TestId,
    ) -> Result<Outcome, RunError> {
        let perm = id.perm.unwrap_or(0);
        let define_error = |source: DefineError| RunError::Define {
            id: id.clone(),
            source,
        };

        plan.install(reg, perm)
            .map_err(|source| RunError::Permutation {
                id: id.clone(),
                source,
            })?;

        if !case.filter(reg).map_err(define_error)? {
            debug!("Runner::run_permutation: id={}, skipped by filter", id);
            return Ok(Outcome::Skipped);
        }

        let cfg = DeviceConfig::from_defines(reg).map_err(define_error)?;
        cfg.validate().map_err(|reason| RunError::InvalidConfig {
            id: id.clone(),
            reason,
        })?;

        let seed = prng::permutation_seed(self.options.seed, perm);
        let uninterrupted = PowerLossSchedule::None;
        let schedule = if case.is_reentrant() {
            &self.options.powerloss
        } else {
            &uninterrupted
        };
        debug!(
            "Runner::run_permutation: id={}, seed={:#010x}, powerloss={}",
            id, seed, schedule
        );

        let mut disk = Vec::new();
        let mut cuts = schedule.cut_points(seed);
        let mut powerlosses = 0u32;
        loop {
            let cut = cuts.next();
            let result = {
                let mut ctx = TestContext::new(&cfg, reg, &mut disk, seed, cut, powerlosses);
                case.run(&mut ctx)
            };

            match (result, cut) {
                (Ok(()), _) => return Ok(Outcome::Passed { powerlosses }),
                (Err(TestError::PowerLoss), Some(at)) => {
                    powerlosses += 1;
                    trace!(
                        "Runner::run_permutation: id={}, power lost after {} cycles",
                        id,
                        at
                    );
                }
                (Err(TestError::Define(source)), _) => return Err(define_error(source)),
                (Err(error), _) => return Ok(Outcome::Failed { error, powerlosses }),
            }
        }
    }
}

impl Selected<'_> {
    fn perm_indices(&self, count: usize) -> Vec<usize> {
        match &self.perms {
            Some(perms) => perms.clone(),
            None => (0..count).collect(),
        }
    }
}
