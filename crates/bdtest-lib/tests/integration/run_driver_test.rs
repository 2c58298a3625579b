use bdtest_lib::defines::{Define, BLOCK_SIZE};
use bdtest_lib::overrides::DefineOverride;
use bdtest_lib::permutation::PermutationError;
use bdtest_lib::powerloss::PowerLossSchedule;
use bdtest_lib::runner::Outcome;
use bdtest_lib::{test_assert, RunError, RunOptions, Runner, TestCase, TestError, TestSuite};
use more_asserts::assert_gt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::{init_logging, run_all, run_selected, Recorder};

#[test]
fn test_reset_isolation_between_permutations() {
    let seen = Recorder::new();
    let record = seen.clone();
    let suites = vec![TestSuite::builder("test_geo", "tests/test_geo.toml")
        .case(
            TestCase::builder("test_geo_sizes")
                .define_values("BLOCK_SIZE", [512, 4096])
                .define_with("BLOCK_COUNT", |reg| Ok(1048576 / reg.resolve(BLOCK_SIZE)?))
                .run(move |ctx| {
                    record.push((ctx.cfg().block_size, ctx.cfg().block_count));
                    Ok(())
                }),
        )
        .build()];

    let report = run_all(&suites, RunOptions::default());
    assert!(report.is_success());
    assert_eq!(seen.take(), vec![(512, 2048), (4096, 256)]);
}

#[test]
fn test_resolver_side_effects_once_per_permutation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let suites = vec![TestSuite::builder("test_memo", "tests/test_memo.toml")
        .case(
            TestCase::builder("test_memo_expensive")
                .define_values("N", [1, 2, 3])
                .define_with("EXPENSIVE", move |reg| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(reg.resolve_named("N")? * 10)
                })
                .filter(|reg| Ok(reg.resolve_named("EXPENSIVE")? > 0))
                .run(|ctx| {
                    let a = ctx.define_named("EXPENSIVE")?;
                    let b = ctx.define_named("EXPENSIVE")?;
                    test_assert!(a == b);
                    test_assert!(a == ctx.define_named("N")? * 10);
                    Ok(())
                }),
        )
        .build()];

    let report = run_all(&suites, RunOptions::default());
    assert_eq!(report.passed(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

fn prog_size_suite(seen: Recorder<u32>) -> Vec<TestSuite> {
    let case_seen = seen.clone();
    vec![TestSuite::builder("test_prec", "tests/test_prec.toml")
        .case(
            TestCase::builder("test_prec_case")
                .define_values("PROG_SIZE", [4])
                .run(move |ctx| {
                    case_seen.push(ctx.cfg().prog_size);
                    Ok(())
                }),
        )
        .case(TestCase::builder("test_prec_plain").run(move |ctx| {
            seen.push(ctx.cfg().prog_size);
            Ok(())
        }))
        .build()]
}

#[test]
fn test_define_precedence() {
    let nor = RunOptions {
        geometries: vec!["nor".to_string()],
        ..RunOptions::default()
    };

    // case beats geometry, geometry beats implicit
    let seen = Recorder::new();
    let suites = prog_size_suite(seen.clone());
    run_all(&suites, nor.clone());
    assert_eq!(seen.take(), vec![4, 1]);

    // overrides beat everything
    let overridden = RunOptions {
        overrides: ["PROG_SIZE=8".parse::<DefineOverride>().unwrap()]
            .into_iter()
            .collect(),
        ..nor
    };
    run_all(&suites, overridden);
    assert_eq!(seen.take(), vec![8, 8]);

    // emmc leaves PROG_SIZE to the implicit default, BLOCK_SIZE
    let emmc = RunOptions {
        geometries: vec!["emmc".to_string()],
        ..RunOptions::default()
    };
    run_selected(&suites, emmc, &["test_prec/test_prec_plain"]);
    assert_eq!(seen.take(), vec![512]);
}

#[test]
fn test_filter_skips_are_not_failures() {
    let suites = vec![TestSuite::builder("test_filter", "tests/test_filter.toml")
        .case(
            TestCase::builder("test_filter_big_blocks")
                .filter(|reg| Ok(reg.resolve(BLOCK_SIZE)? >= 4096))
                .run(|ctx| {
                    test_assert!(ctx.cfg().block_size >= 4096);
                    Ok(())
                }),
        )
        .build()];

    let options = RunOptions {
        geometries: vec!["all".to_string()],
        ..RunOptions::default()
    };
    let report = run_all(&suites, options);
    // default, eeprom and emmc use 512-byte blocks
    assert_eq!(report.skipped(), 3);
    assert_eq!(report.passed(), 2);
    assert!(report.is_success());
}

#[test]
fn test_failures_recorded_and_run_continues() {
    let suites = vec![TestSuite::builder("test_fail", "tests/test_fail.toml")
        .case(
            TestCase::builder("test_fail_some")
                .define_values("N", [0, 1, 2, 3])
                .run(|ctx| {
                    let n = ctx.define_named("N")?;
                    if n == 2 {
                        return Err(TestError::Failed("N=2 is cursed".to_string()));
                    }
                    Ok(())
                }),
        )
        .case(TestCase::builder("test_fail_after"))
        .build()];

    let report = run_all(&suites, RunOptions::default());
    assert_eq!(report.results().len(), 5);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.passed(), 4);

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.id.to_string(), "test_fail/test_fail_some:2");
    assert_eq!(
        failure.outcome,
        Outcome::Failed {
            error: TestError::Failed("N=2 is cursed".to_string()),
            powerlosses: 0,
        }
    );
}

#[test]
fn test_declared_count_mismatch_aborts() {
    init_logging();
    let suites = vec![TestSuite::builder("test_count", "tests/test_count.toml")
        .case(
            TestCase::builder("test_count_wrong")
                .define_values("N", [1, 2])
                .permutations(5),
        )
        .case(TestCase::builder("test_count_zero").permutations(0))
        .build()];
    let runner = Runner::new(&suites, RunOptions::default()).unwrap();

    match runner.run(&["test_count/test_count_wrong".parse().unwrap()]) {
        Err(RunError::Permutation { id, source }) => {
            assert_eq!(id.to_string(), "test_count/test_count_wrong");
            assert_eq!(
                source,
                PermutationError::CountMismatch {
                    declared: 5,
                    computed: 2
                }
            );
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(matches!(
        runner.run(&["test_count/test_count_zero".parse().unwrap()]),
        Err(RunError::Permutation {
            source: PermutationError::ZeroPermutations,
            ..
        })
    ));
}

#[test]
fn test_cycle_aborts_run() {
    init_logging();
    let suites = vec![TestSuite::builder("test_cycle", "tests/test_cycle.toml")
        .case(
            TestCase::builder("test_cycle_ab")
                .define("A", vec![Define::derived(|reg| reg.resolve_named("B"))])
                .define("B", vec![Define::derived(|reg| reg.resolve_named("A"))])
                .run(|ctx| {
                    ctx.define_named("A")?;
                    Ok(())
                }),
        )
        .build()];

    let err = Runner::new(&suites, RunOptions::default())
        .unwrap()
        .run(&[])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "test_cycle/test_cycle_ab:0: Cyclic define dependency: A -> B -> A"
    );
}

/// A reentrant case that appends one byte per power cycle until the disk
/// holds `len` bytes.
fn progress_suite(len: usize, invocations: Arc<AtomicUsize>) -> Vec<TestSuite> {
    vec![TestSuite::builder("test_pl", "tests/test_pl.toml")
        .case(
            TestCase::builder("test_pl_append")
                .reentrant()
                .run(move |ctx| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    while ctx.disk().len() < len {
                        ctx.power_cycle()?;
                        let mark = ctx.powerlosses() as u8;
                        ctx.disk().push(mark);
                    }
                    Ok(())
                }),
        )
        .build()]
}

#[test]
fn test_explicit_schedule_then_uninterrupted() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let suites = progress_suite(10, Arc::clone(&invocations));
    let options = RunOptions {
        powerloss: "{1,2,3}".parse().unwrap(),
        ..RunOptions::default()
    };

    let report = run_all(&suites, options);
    assert!(report.is_success());
    // three cuts, then one run without power loss
    assert_eq!(report.powerlosses(), 3);
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
}

#[test]
fn test_log_schedule_until_complete() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let suites = progress_suite(20, Arc::clone(&invocations));
    let options = RunOptions {
        powerloss: PowerLossSchedule::Log,
        ..RunOptions::default()
    };

    let report = run_all(&suites, options);
    assert!(report.is_success());
    // cuts at 1, 2, 4, 8 add 0, 1, 3, 7 bytes; the cut at 16 is never hit
    assert_eq!(report.powerlosses(), 4);
    assert_eq!(invocations.load(Ordering::SeqCst), 5);
}

#[test]
fn test_random_schedule_is_deterministic() {
    let options = RunOptions {
        seed: 1234,
        powerloss: PowerLossSchedule::Random { max: 10 },
        ..RunOptions::default()
    };

    let first_invocations = Arc::new(AtomicUsize::new(0));
    let first = run_all(
        &progress_suite(30, Arc::clone(&first_invocations)),
        options.clone(),
    );
    let second_invocations = Arc::new(AtomicUsize::new(0));
    let second = run_all(
        &progress_suite(30, Arc::clone(&second_invocations)),
        options,
    );

    assert!(first.is_success());
    assert_eq!(first, second);
    assert_eq!(
        first_invocations.load(Ordering::SeqCst),
        second_invocations.load(Ordering::SeqCst)
    );
    // every cut is at most 10 cycles, so 30 bytes need at least 3 cuts
    assert_gt!(first.powerlosses(), 2);
}

#[test]
fn test_random_schedule_ends_when_case_outlasts_max() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let suites = vec![TestSuite::builder("test_pl_long", "tests/test_pl_long.toml")
        .case(
            TestCase::builder("test_pl_long_restart")
                .reentrant()
                .run(move |ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    // starts over on every invocation and always needs 20 cycles
                    for _ in 0..20 {
                        ctx.power_cycle()?;
                    }
                    Ok(())
                }),
        )
        .build()];
    let options = RunOptions {
        powerloss: PowerLossSchedule::Random { max: 10 },
        ..RunOptions::default()
    };

    let report = run_all(&suites, options);
    assert!(report.is_success());
    // ten cuts in 1..=10, then one run without power loss
    assert_eq!(report.powerlosses(), 10);
    assert_eq!(invocations.load(Ordering::SeqCst), 11);
}

#[test]
fn test_permutation_seeds() {
    let seen = Recorder::new();
    let record = seen.clone();
    let suites = vec![TestSuite::builder("test_seed", "tests/test_seed.toml")
        .case(
            TestCase::builder("test_seed_draw")
                .define_values("N", [0, 1, 2, 3])
                .run(move |ctx| {
                    record.push(ctx.prng());
                    Ok(())
                }),
        )
        .build()];

    let seeded = |seed| RunOptions {
        seed,
        ..RunOptions::default()
    };

    run_all(&suites, seeded(7));
    let first = seen.take();
    run_all(&suites, seeded(7));
    let again = seen.take();
    run_all(&suites, seeded(8));
    let other = seen.take();

    assert_eq!(first, again);
    assert_ne!(first, other);
    // each permutation starts from its own state
    let mut distinct = first.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), first.len());

    // rerunning a single permutation reproduces its draw
    run_selected(&suites, seeded(7), &["test_seed/test_seed_draw:2"]);
    assert_eq!(seen.take(), vec![first[2]]);
}
