//! Permutation enumeration
//!
//! A run is parameterized by a list of [`Axis`] values. Each axis is a list
//! of candidate assignments; a multi-valued define is an axis whose
//! candidates each assign that one define, a storage geometry is an axis
//! whose candidates assign several defines at once.
//!
//! Permutations are numbered by mixed-radix decomposition with the axis
//! lengths as radices. The first axis is the least significant digit, so
//! consecutive indices vary the first declared define fastest. The mapping
//! depends only on declaration order.
//!
//! # Example
//!
//! ```
//! use bdtest_lib::defines::{Define, BLOCK_SIZE, PROG_SIZE};
//! use bdtest_lib::permutation::{Axis, Permutations};
//!
//! let perms = Permutations::new(vec![
//!     Axis::values(BLOCK_SIZE, "BLOCK_SIZE", [512, 4096]),
//!     Axis::values(PROG_SIZE, "PROG_SIZE", [1, 16, 64]),
//! ]);
//! assert_eq!(perms.count().unwrap(), 6);
//!
//! let third = perms.select(2).unwrap();
//! assert_eq!(third[0].1.as_const(), Some(512));
//! assert_eq!(third[1].1.as_const(), Some(16));
//! ```

use log::debug;
use thiserror::Error;

use crate::defines::{Define, DefineError, DefineRegistry, DefineValue, Layer};

/// One concrete `(index, define)` assignment.
pub type Assignment = Vec<(usize, Define)>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermutationError {
    #[error("Declared {declared} permutations but defines produce {computed}")]
    CountMismatch { declared: usize, computed: usize },

    #[error("Declared permutation count is zero")]
    ZeroPermutations,

    #[error("Permutation {index} out of range ({count} permutations)")]
    OutOfRange { index: usize, count: usize },

    #[error("Axis {0} has no candidate values")]
    EmptyAxis(String),

    #[error("Permutation count overflows usize")]
    Overflow,

    #[error(transparent)]
    Define(#[from] DefineError),
}

/// An independent dimension of the permutation space.
#[derive(Debug, Clone)]
pub struct Axis {
    name: String,
    candidates: Vec<Assignment>,
}

impl Axis {
    /// An axis from explicit candidate assignments.
    pub fn new(name: impl Into<String>, candidates: Vec<Assignment>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }

    /// An axis over the candidate defines of a single index.
    pub fn define(index: usize, name: impl Into<String>, candidates: Vec<Define>) -> Self {
        Self::new(
            name,
            candidates.into_iter().map(|d| vec![(index, d)]).collect(),
        )
    }

    /// An axis over constant values of a single index.
    pub fn values<I>(index: usize, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = DefineValue>,
    {
        Self::define(index, name, values.into_iter().map(Define::Const).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Assignment] {
        &self.candidates
    }
}

/// The cross product of a list of axes.
#[derive(Debug, Clone, Default)]
pub struct Permutations {
    axes: Vec<Axis>,
}

impl Permutations {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Append an axis. It becomes the most significant digit.
    pub fn push(&mut self, axis: Axis) {
        self.axes.push(axis);
    }

    /// Product of the axis lengths. No axes means one permutation.
    pub fn count(&self) -> Result<usize, PermutationError> {
        let mut count: usize = 1;
        for axis in &self.axes {
            if axis.is_empty() {
                return Err(PermutationError::EmptyAxis(axis.name.clone()));
            }
            count = count
                .checked_mul(axis.len())
                .ok_or(PermutationError::Overflow)?;
        }
        Ok(count)
    }

    /// Check the computed count against a declared one.
    pub fn validate(&self, declared: usize) -> Result<usize, PermutationError> {
        if declared == 0 {
            return Err(PermutationError::ZeroPermutations);
        }
        let computed = self.count()?;
        if computed != declared {
            return Err(PermutationError::CountMismatch { declared, computed });
        }
        Ok(computed)
    }

    /// Candidate index chosen on each axis for permutation `index`.
    pub fn digits(&self, index: usize) -> Result<Vec<usize>, PermutationError> {
        let count = self.count()?;
        if index >= count {
            return Err(PermutationError::OutOfRange { index, count });
        }

        Ok(self.split(index))
    }

    /// Mixed-radix digits of `index`. Callers check it against `count`.
    fn split(&self, index: usize) -> Vec<usize> {
        let mut rest = index;
        self.axes
            .iter()
            .map(|axis| {
                let digit = rest % axis.len();
                rest /= axis.len();
                digit
            })
            .collect()
    }

    fn assemble(&self, digits: Vec<usize>) -> Assignment {
        self.axes
            .iter()
            .zip(digits)
            .flat_map(|(axis, digit)| axis.candidates[digit].iter().cloned())
            .collect()
    }

    /// The assignment for permutation `index`, axes in declaration order.
    pub fn select(&self, index: usize) -> Result<Assignment, PermutationError> {
        let digits = self.digits(index)?;
        Ok(self.assemble(digits))
    }

    /// Select permutation `index` and install it into `layer` of `reg`.
    ///
    /// The registry's cache is cleared, so the next resolve sees exactly
    /// this permutation.
    pub fn install(
        &self,
        reg: &mut DefineRegistry,
        layer: Layer,
        index: usize,
    ) -> Result<(), PermutationError> {
        let assignment = self.select(index)?;
        debug!(
            "Permutations::install: index={}, layer={:?}, assigned={}",
            index,
            layer,
            assignment.len()
        );
        reg.install(layer, &assignment)?;
        Ok(())
    }

    /// Every assignment in index order.
    pub fn iter(&self) -> Result<impl Iterator<Item = Assignment> + '_, PermutationError> {
        let count = self.count()?;
        Ok((0..count).map(move |i| self.assemble(self.split(i))))
    }
}
