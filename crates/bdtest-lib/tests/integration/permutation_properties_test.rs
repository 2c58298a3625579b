use bdtest_lib::defines::Layer;
use bdtest_lib::overrides::OverrideSet;
use bdtest_lib::runner::CasePlan;
use bdtest_lib::{geometry, TestCase, TestSuite};
use more_asserts::{assert_ge, assert_lt};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// A suite with one case whose define `Dk` takes `lens[k]` distinct values.
fn suite(lens: &[usize]) -> TestSuite {
    let mut case = TestCase::builder("test_prop_case");
    for (k, &len) in lens.iter().enumerate() {
        let values = (0..len as i64).map(move |j| k as i64 * 100 + j);
        case = case.define_values(format!("D{}", k), values);
    }
    TestSuite::builder("test_prop", "tests/test_prop.toml")
        .case(case)
        .build()
}

/// Resolve every `Dk` of permutation `index`.
fn assignment(suite: &TestSuite, lens: &[usize], index: usize) -> Vec<i64> {
    let case = &suite.cases()[0];
    let perms = case.axes(suite.define_names());
    let mut reg = suite.registry();
    perms.install(&mut reg, Layer::Case, index).unwrap();
    (0..lens.len())
        .map(|k| reg.resolve_named(&format!("D{}", k)).unwrap())
        .collect()
}

proptest! {
    #[test]
    fn prop_permutations_complete_and_distinct(lens in prop::collection::vec(1usize..5, 1..4)) {
        let suite = suite(&lens);
        let count: usize = lens.iter().product();
        prop_assert_eq!(suite.cases()[0].permutations(), count);

        let seen: BTreeSet<Vec<i64>> = (0..count)
            .map(|i| assignment(&suite, &lens, i))
            .collect();
        prop_assert_eq!(seen.len(), count);

        for values in &seen {
            for (k, &v) in values.iter().enumerate() {
                assert_ge!(v, k as i64 * 100);
                assert_lt!(v, k as i64 * 100 + lens[k] as i64);
            }
        }
    }

    #[test]
    fn prop_same_index_same_assignment(
        lens in prop::collection::vec(1usize..5, 1..4),
        pick in any::<prop::sample::Index>(),
    ) {
        let suite = suite(&lens);
        let count: usize = lens.iter().product();
        let index = pick.index(count);
        prop_assert_eq!(
            assignment(&suite, &lens, index),
            assignment(&suite, &lens, index)
        );
    }

    #[test]
    fn prop_first_define_varies_fastest(lens in prop::collection::vec(2usize..5, 2..4)) {
        let suite = suite(&lens);
        let first = assignment(&suite, &lens, 0);
        let second = assignment(&suite, &lens, 1);
        prop_assert_ne!(first[0], second[0]);
        prop_assert_eq!(&first[1..], &second[1..]);
    }

    #[test]
    fn prop_plan_split_round_trips(
        lens in prop::collection::vec(1usize..4, 0..3),
        geometries in 1usize..=5,
    ) {
        let suite = suite(&lens);
        let selected: Vec<_> = geometry::BUILTIN_GEOMETRIES.iter().take(geometries).collect();
        let plan = CasePlan::new(
            &suite.cases()[0],
            suite.define_names(),
            &OverrideSet::new(),
            &selected,
        )
        .unwrap();

        let case_count: usize = lens.iter().product();
        prop_assert_eq!(plan.count(), case_count * geometries);

        let mut seen = BTreeSet::new();
        for i in 0..plan.count() {
            let (case, overrides, geometry) = plan.split(i).unwrap();
            prop_assert_eq!(overrides, 0);
            prop_assert_eq!(case + geometry * case_count, i);
            seen.insert((case, geometry));
        }
        prop_assert_eq!(seen.len(), plan.count());
    }
}
