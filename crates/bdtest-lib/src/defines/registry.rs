//! Define registry
//!
//! The registry owns everything needed to resolve the defines of one
//! permutation of one case:
//!
//! - the suite's define name table,
//! - the installed defines, split into precedence [`Layer`]s,
//! - the memoization cache for the current permutation.
//!
//! Nothing here is global. A driver that wants to run permutations in
//! parallel gives each one its own registry.
//!
//! # Example
//!
//! ```
//! use bdtest_lib::defines::{Define, DefineRegistry, Layer, BLOCK_COUNT, BLOCK_SIZE};
//!
//! let mut reg = DefineRegistry::implicit();
//! reg.set(Layer::Case, BLOCK_SIZE, Define::constant(4096)).unwrap();
//! assert_eq!(reg.resolve(BLOCK_COUNT).unwrap(), 256);
//! ```

use std::sync::Arc;

use log::{debug, trace};

use super::{implicit_names, Define, DefineError, DefineValue, IMPLICIT_DEFINES};

/// Where an installed define came from. Earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Values given by the user for this run.
    Override,
    /// The case's own defines for the current permutation.
    Case,
    /// The storage geometry selected for the current permutation.
    Geometry,
    /// Built-in defaults of the implicit defines.
    Implicit,
}

impl Layer {
    pub const COUNT: usize = 4;

    /// All layers, highest precedence first.
    pub const ALL: [Layer; Layer::COUNT] =
        [Layer::Override, Layer::Case, Layer::Geometry, Layer::Implicit];

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Unresolved,
    Resolving,
    Resolved(DefineValue),
}

/// Resolves defines for one permutation at a time.
pub struct DefineRegistry {
    names: Arc<[String]>,
    layers: [Vec<Option<Define>>; Layer::COUNT],
    cache: Vec<Slot>,
    /// Indices currently being resolved, outermost first.
    stack: Vec<usize>,
}

impl DefineRegistry {
    /// Create a registry for a suite's define name table.
    ///
    /// Leading names that match the implicit define table get the implicit
    /// defaults installed in the [`Layer::Implicit`] layer.
    pub fn new(names: impl Into<Arc<[String]>>) -> Self {
        let names = names.into();
        let count = names.len();
        let mut reg = Self {
            names,
            layers: std::array::from_fn(|_| vec![None; count]),
            cache: vec![Slot::Unresolved; count],
            stack: Vec::new(),
        };

        for def in IMPLICIT_DEFINES.iter() {
            if reg.names.get(def.index).map(String::as_str) == Some(def.name) {
                reg.layers[Layer::Implicit.slot()][def.index] = Some(def.to_define());
            }
        }

        reg
    }

    /// A registry holding only the implicit defines.
    pub fn implicit() -> Self {
        let names: Vec<String> = implicit_names().map(String::from).collect();
        Self::new(names)
    }

    /// Number of defines in the name table.
    pub fn define_count(&self) -> usize {
        self.names.len()
    }

    /// The define name table.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the define at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Index of the define called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Install a define into a layer. Clears the cache.
    pub fn set(&mut self, layer: Layer, index: usize, define: Define) -> Result<(), DefineError> {
        self.check_index(index)?;
        self.layers[layer.slot()][index] = Some(define);
        self.reset();
        Ok(())
    }

    /// Install a batch of `(index, define)` pairs into a layer, replacing
    /// whatever the layer held. Clears the cache.
    pub fn install<'a, I>(&mut self, layer: Layer, assignment: I) -> Result<(), DefineError>
    where
        I: IntoIterator<Item = &'a (usize, Define)>,
    {
        let count = self.names.len();
        let mut fresh: Vec<Option<Define>> = vec![None; count];
        for (index, define) in assignment {
            self.check_index(*index)?;
            fresh[*index] = Some(define.clone());
        }
        debug!(
            "DefineRegistry::install: layer={:?}, defines={}",
            layer,
            fresh.iter().filter(|d| d.is_some()).count()
        );
        self.layers[layer.slot()] = fresh;
        self.reset();
        Ok(())
    }

    /// Remove every define from a layer. Clears the cache.
    pub fn clear_layer(&mut self, layer: Layer) {
        for slot in self.layers[layer.slot()].iter_mut() {
            *slot = None;
        }
        self.reset();
    }

    /// Forget every resolved value. Called at the start of each permutation.
    pub fn reset(&mut self) {
        for slot in self.cache.iter_mut() {
            *slot = Slot::Unresolved;
        }
        self.stack.clear();
    }

    /// The define that currently applies to `index`, with the layer it
    /// comes from.
    pub fn lookup(&self, index: usize) -> Option<(Layer, &Define)> {
        Layer::ALL.iter().find_map(|&layer| {
            self.layers[layer.slot()]
                .get(index)
                .and_then(Option::as_ref)
                .map(|d| (layer, d))
        })
    }

    /// Whether `index` already has a value in the current permutation.
    pub fn is_resolved(&self, index: usize) -> bool {
        matches!(self.cache.get(index), Some(Slot::Resolved(_)))
    }

    /// Resolve the define at `index`.
    ///
    /// The first call within a permutation runs the resolver and caches the
    /// result; later calls return the cached value. Resolvers may resolve
    /// other defines. A resolver that reaches its own define again fails with
    /// [`DefineError::Cycle`].
    pub fn resolve(&mut self, index: usize) -> Result<DefineValue, DefineError> {
        let slot = *self.cache.get(index).ok_or(DefineError::OutOfRange {
            index,
            count: self.names.len(),
        })?;

        match slot {
            Slot::Resolved(value) => return Ok(value),
            Slot::Resolving => return Err(self.cycle_error(index)),
            Slot::Unresolved => {}
        }

        let (layer, define) = match self.lookup(index) {
            Some((layer, define)) => (layer, define.clone()),
            None => {
                return Err(DefineError::Undefined {
                    name: self.names[index].clone(),
                })
            }
        };

        self.cache[index] = Slot::Resolving;
        self.stack.push(index);
        let result = match &define {
            Define::Const(value) => Ok(*value),
            Define::Derived(f) => f(self),
        };
        self.stack.pop();

        match result {
            Ok(value) => {
                trace!(
                    "DefineRegistry::resolve: {}={} ({:?})",
                    self.names[index],
                    value,
                    layer
                );
                self.cache[index] = Slot::Resolved(value);
                Ok(value)
            }
            Err(e) => {
                self.cache[index] = Slot::Unresolved;
                Err(e)
            }
        }
    }

    /// Resolve a define by name.
    pub fn resolve_named(&mut self, name: &str) -> Result<DefineValue, DefineError> {
        let index = self.index_of(name).ok_or_else(|| DefineError::Undefined {
            name: name.to_string(),
        })?;
        self.resolve(index)
    }

    /// Resolve every define that has a value, in index order.
    ///
    /// Defines with no value in any layer are left out.
    pub fn snapshot(&mut self) -> Result<Vec<(String, DefineValue)>, DefineError> {
        let mut out = Vec::new();
        for index in 0..self.names.len() {
            if self.lookup(index).is_some() {
                out.push((self.names[index].clone(), self.resolve(index)?));
            }
        }
        Ok(out)
    }

    fn check_index(&self, index: usize) -> Result<(), DefineError> {
        if index < self.names.len() {
            Ok(())
        } else {
            Err(DefineError::OutOfRange {
                index,
                count: self.names.len(),
            })
        }
    }

    fn cycle_error(&self, index: usize) -> DefineError {
        let start = self.stack.iter().position(|&i| i == index).unwrap_or(0);
        let mut chain: Vec<&str> = self.stack[start..]
            .iter()
            .map(|&i| self.names[i].as_str())
            .collect();
        chain.push(&self.names[index]);

        DefineError::Cycle {
            name: self.names[index].clone(),
            chain: chain.join(" -> "),
        }
    }
}

impl Clone for DefineRegistry {
    /// Clones the installed defines but not the cache.
    fn clone(&self) -> Self {
        Self {
            names: Arc::clone(&self.names),
            layers: self.layers.clone(),
            cache: vec![Slot::Unresolved; self.names.len()],
            stack: Vec::new(),
        }
    }
}

impl std::fmt::Debug for DefineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = self
            .cache
            .iter()
            .filter(|s| matches!(s, Slot::Resolved(_)))
            .count();
        f.debug_struct("DefineRegistry")
            .field("names", &self.names)
            .field("resolved", &resolved)
            .finish_non_exhaustive()
    }
}
