//! Permutation plan of one case
//!
//! A case runs over three groups of axes: its own defines, the user's
//! multi-valued overrides and the selected geometries. Each group is
//! installed into its own registry layer, so the layer precedence decides
//! which value wins when two groups set the same define. The flat index
//! varies the case's defines fastest, then overrides, then geometry.

use crate::defines::{DefineRegistry, Layer};
use crate::geometry::{self, Geometry};
use crate::overrides::OverrideSet;
use crate::permutation::{PermutationError, Permutations};
use crate::suite::TestCase;

#[derive(Debug, Clone)]
pub struct CasePlan {
    case: Permutations,
    overrides: Permutations,
    geometries: Permutations,
    counts: [usize; 3],
    total: usize,
}

impl CasePlan {
    /// Build the plan and validate the case's declared permutation count.
    pub fn new(
        case: &TestCase,
        names: &[String],
        overrides: &OverrideSet,
        geometries: &[&Geometry],
    ) -> Result<Self, PermutationError> {
        let case_perms = case.axes(names);
        let override_perms = Permutations::new(overrides.axes(names));
        let geometry_perms = Permutations::new(vec![geometry::axis(geometries)]);

        let counts = [
            case_perms.validate(case.permutations())?,
            override_perms.count()?,
            geometry_perms.count()?,
        ];
        let total = counts
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or(PermutationError::Overflow)?;

        Ok(Self {
            case: case_perms,
            overrides: override_perms,
            geometries: geometry_perms,
            counts,
            total,
        })
    }

    /// Number of flat permutations.
    pub fn count(&self) -> usize {
        self.total
    }

    /// Permutations contributed by the case's own defines.
    pub fn case_count(&self) -> usize {
        self.counts[0]
    }

    /// Split a flat index into `(case, override, geometry)` indices.
    pub fn split(&self, index: usize) -> Result<(usize, usize, usize), PermutationError> {
        if index >= self.total {
            return Err(PermutationError::OutOfRange {
                index,
                count: self.total,
            });
        }
        let [case, overrides, _] = self.counts;
        Ok((
            index % case,
            (index / case) % overrides,
            index / (case * overrides),
        ))
    }

    /// Install flat permutation `index` into `reg`, replacing the case,
    /// override and geometry layers. Leaves the cache empty.
    pub fn install(&self, reg: &mut DefineRegistry, index: usize) -> Result<(), PermutationError> {
        let (case, overrides, geometry) = self.split(index)?;
        self.case.install(reg, Layer::Case, case)?;
        self.overrides.install(reg, Layer::Override, overrides)?;
        self.geometries.install(reg, Layer::Geometry, geometry)?;
        Ok(())
    }
}
