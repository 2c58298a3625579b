//! Test suites and cases
//!
//! A [`TestSuite`] groups cases that share a define name table. The table
//! starts with the implicit defines, followed by every define a case of the
//! suite declares, in first-declaration order. Cases refer to defines by
//! position in that table.
//!
//! Suites are normally produced by a code generator; [`TestSuiteBuilder`]
//! and [`TestCaseBuilder`] are the surface it (and hand-written tests)
//! targets.
//!
//! # Example
//!
//! ```
//! use bdtest_lib::suite::{TestCase, TestFlags, TestSuite};
//!
//! let suite = TestSuite::builder("test_dirs", "tests/test_dirs.toml")
//!     .case(
//!         TestCase::builder("test_dirs_many")
//!             .define_values("N", [1, 2, 5, 11])
//!             .run(|ctx| {
//!                 let n = ctx.define_named("N")?;
//!                 assert!(n > 0);
//!                 Ok(())
//!             }),
//!     )
//!     .build();
//!
//! let case = suite.case("test_dirs_many").unwrap();
//! assert_eq!(case.permutations(), 4);
//! assert!(!case.flags().contains(TestFlags::REENTRANT));
//! ```

use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::context::{TestContext, TestError};
use crate::defines::{implicit_names, Define, DefineError, DefineRegistry, DefineValue};
use crate::permutation::{Axis, Permutations};

/// Signature of a case filter.
pub type FilterFn = dyn Fn(&mut DefineRegistry) -> Result<bool, DefineError> + Send + Sync;

/// Signature of a case's entry point.
pub type RunFn = dyn Fn(&mut TestContext<'_>) -> Result<(), TestError> + Send + Sync;

/// Flags of a case or suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TestFlags(u8);

impl TestFlags {
    pub const NONE: TestFlags = TestFlags(0);
    /// Rerun the case across simulated power losses.
    pub const REENTRANT: TestFlags = TestFlags(0x1);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: TestFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TestFlags {
    type Output = TestFlags;

    fn bitor(self, rhs: TestFlags) -> TestFlags {
        TestFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TestFlags {
    fn bitor_assign(&mut self, rhs: TestFlags) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for TestFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.contains(TestFlags::REENTRANT) {
            f.write_str("reentrant")
        } else {
            f.write_str("-")
        }
    }
}

/// A single test case of a suite.
pub struct TestCase {
    name: String,
    path: String,
    flags: TestFlags,
    permutations: usize,
    /// Candidates per define index, sized to the suite's name table. An
    /// empty list means the case leaves that define alone.
    defines: Vec<Vec<Define>>,
    filter: Option<Arc<FilterFn>>,
    run: Arc<RunFn>,
}

impl TestCase {
    pub fn builder(name: impl Into<String>) -> TestCaseBuilder {
        TestCaseBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> TestFlags {
        self.flags
    }

    pub fn is_reentrant(&self) -> bool {
        self.flags.contains(TestFlags::REENTRANT)
    }

    /// Declared permutation count.
    pub fn permutations(&self) -> usize {
        self.permutations
    }

    /// Candidate defines per index.
    pub fn defines(&self) -> &[Vec<Define>] {
        &self.defines
    }

    /// One axis per define the case sets, in name table order.
    pub fn axes(&self, names: &[String]) -> Permutations {
        let axes = self
            .defines
            .iter()
            .enumerate()
            .filter(|(_, candidates)| !candidates.is_empty())
            .map(|(index, candidates)| {
                let name = names.get(index).cloned().unwrap_or_else(|| index.to_string());
                Axis::define(index, name, candidates.clone())
            })
            .collect();
        Permutations::new(axes)
    }

    /// Whether the case applies to the current permutation.
    pub fn filter(&self, reg: &mut DefineRegistry) -> Result<bool, DefineError> {
        match &self.filter {
            Some(f) => f(reg),
            None => Ok(true),
        }
    }

    /// Invoke the case's entry point.
    pub fn run(&self, ctx: &mut TestContext<'_>) -> Result<(), TestError> {
        (self.run)(ctx)
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("permutations", &self.permutations)
            .field("has_filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

/// A named group of cases sharing a define name table.
#[derive(Debug)]
pub struct TestSuite {
    name: String,
    path: String,
    flags: TestFlags,
    define_names: Arc<[String]>,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn builder(name: impl Into<String>, path: impl Into<String>) -> TestSuiteBuilder {
        TestSuiteBuilder::new(name, path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Union of the suite's own flags and its cases' flags.
    pub fn flags(&self) -> TestFlags {
        self.flags
    }

    pub fn define_names(&self) -> &[String] {
        &self.define_names
    }

    pub fn define_count(&self) -> usize {
        self.define_names.len()
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn case(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// A fresh registry over this suite's name table.
    pub fn registry(&self) -> DefineRegistry {
        DefineRegistry::new(Arc::clone(&self.define_names))
    }
}

/// Builder for [`TestCase`]. Defines are declared by name and bound to
/// indices when the case is added to a suite.
pub struct TestCaseBuilder {
    name: String,
    path: Option<String>,
    flags: TestFlags,
    permutations: Option<usize>,
    defines: Vec<(String, Vec<Define>)>,
    filter: Option<Arc<FilterFn>>,
    run: Option<Arc<RunFn>>,
}

impl TestCaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            flags: TestFlags::NONE,
            permutations: None,
            defines: Vec::new(),
            filter: None,
            run: None,
        }
    }

    /// Source location, e.g. `tests/test_dirs.toml:12`. Defaults to the
    /// suite's path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn flags(mut self, flags: TestFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn reentrant(self) -> Self {
        self.flags(TestFlags::REENTRANT)
    }

    /// Declare the permutation count explicitly instead of deriving it from
    /// the defines. The run driver rejects a count that does not match.
    pub fn permutations(mut self, permutations: usize) -> Self {
        self.permutations = Some(permutations);
        self
    }

    /// Declare a define with one or more candidates. Declaring the same name
    /// twice replaces the earlier candidates.
    pub fn define(mut self, name: impl Into<String>, candidates: Vec<Define>) -> Self {
        let name = name.into();
        match self.defines.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = candidates,
            None => self.defines.push((name, candidates)),
        }
        self
    }

    /// Declare a define over constant values.
    pub fn define_values<I>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = DefineValue>,
    {
        let candidates = values.into_iter().map(Define::Const).collect();
        self.define(name, candidates)
    }

    /// Declare a single derived define.
    pub fn define_with<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut DefineRegistry) -> Result<DefineValue, DefineError> + Send + Sync + 'static,
    {
        self.define(name, vec![Define::derived(f)])
    }

    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut DefineRegistry) -> Result<bool, DefineError> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(f));
        self
    }

    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TestContext<'_>) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.run = Some(Arc::new(f));
        self
    }

    fn bind(self, suite_path: &str, names: &[String]) -> TestCase {
        let mut defines = vec![Vec::new(); names.len()];
        for (name, candidates) in self.defines {
            if let Some(index) = names.iter().position(|n| *n == name) {
                defines[index] = candidates;
            }
        }

        let permutations = self.permutations.unwrap_or_else(|| {
            defines
                .iter()
                .filter(|c| !c.is_empty())
                .map(Vec::len)
                .product()
        });

        TestCase {
            name: self.name,
            path: self.path.unwrap_or_else(|| suite_path.to_string()),
            flags: self.flags,
            permutations,
            defines,
            filter: self.filter,
            run: self.run.unwrap_or_else(|| Arc::new(noop)),
        }
    }
}

fn noop(_: &mut TestContext<'_>) -> Result<(), TestError> {
    Ok(())
}

/// Builder for [`TestSuite`].
pub struct TestSuiteBuilder {
    name: String,
    path: String,
    flags: TestFlags,
    names: Vec<String>,
    cases: Vec<TestCaseBuilder>,
}

impl TestSuiteBuilder {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            flags: TestFlags::NONE,
            names: implicit_names().map(String::from).collect(),
            cases: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: TestFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Reserve a name in the define table ahead of any case declaring it.
    pub fn define(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        self
    }

    pub fn case(mut self, case: TestCaseBuilder) -> Self {
        for (name, _) in &case.defines {
            if !self.names.contains(name) {
                self.names.push(name.clone());
            }
        }
        self.cases.push(case);
        self
    }

    pub fn build(self) -> TestSuite {
        let mut flags = self.flags;
        let cases: Vec<TestCase> = self
            .cases
            .into_iter()
            .map(|c| c.bind(&self.path, &self.names))
            .collect();
        for case in &cases {
            flags |= case.flags;
        }

        TestSuite {
            name: self.name,
            path: self.path,
            flags,
            define_names: self.names.into(),
            cases,
        }
    }
}
