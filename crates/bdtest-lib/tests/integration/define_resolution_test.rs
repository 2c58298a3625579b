use bdtest_lib::defines::{
    Define, DefineError, Layer, BLOCK_COUNT, BLOCK_SIZE, CACHE_SIZE, IMPLICIT_DEFINE_COUNT,
    PROG_SIZE, READ_SIZE,
};
use bdtest_lib::{DeviceConfig, TestCase, TestSuite};

fn suite() -> TestSuite {
    TestSuite::builder("test_resolve", "tests/test_resolve.toml")
        .case(
            TestCase::builder("test_resolve_chain")
                .define_values("FILES", [3])
                .define_with("BYTES", |reg| {
                    Ok(reg.resolve_named("FILES")? * reg.resolve(BLOCK_SIZE)?)
                }),
        )
        .build()
}

#[test]
fn test_suite_registry_layout() {
    let suite = suite();
    let reg = suite.registry();
    assert_eq!(reg.define_count(), IMPLICIT_DEFINE_COUNT + 2);
    assert_eq!(reg.index_of("FILES"), Some(IMPLICIT_DEFINE_COUNT));
    assert_eq!(reg.index_of("BYTES"), Some(IMPLICIT_DEFINE_COUNT + 1));
    assert_eq!(reg.name(READ_SIZE), Some("READ_SIZE"));
}

#[test]
fn test_derived_chain_through_layers() {
    let suite = suite();
    let case = suite.case("test_resolve_chain").unwrap();
    let mut reg = suite.registry();

    case.axes(suite.define_names())
        .install(&mut reg, Layer::Case, 0)
        .unwrap();
    reg.set(Layer::Geometry, BLOCK_SIZE, Define::constant(4096))
        .unwrap();

    assert_eq!(reg.resolve_named("BYTES").unwrap(), 3 * 4096);
    assert_eq!(reg.resolve(BLOCK_COUNT).unwrap(), 256);

    // a new geometry must not see values cached for the old one
    reg.set(Layer::Geometry, BLOCK_SIZE, Define::constant(512))
        .unwrap();
    assert!(!reg.is_resolved(BLOCK_COUNT));
    assert_eq!(reg.resolve_named("BYTES").unwrap(), 3 * 512);
    assert_eq!(reg.resolve(BLOCK_COUNT).unwrap(), 2048);
}

#[test]
fn test_device_config_follows_overrides() {
    let suite = suite();
    let mut reg = suite.registry();
    reg.set(Layer::Geometry, BLOCK_SIZE, Define::constant(4096))
        .unwrap();
    reg.set(Layer::Geometry, PROG_SIZE, Define::constant(256))
        .unwrap();
    reg.set(Layer::Override, READ_SIZE, Define::constant(64))
        .unwrap();

    let cfg = DeviceConfig::from_defines(&mut reg).unwrap();
    assert_eq!(cfg.read_size, 64);
    assert_eq!(cfg.prog_size, 256);
    assert_eq!(reg.resolve(CACHE_SIZE).unwrap(), 256);
    assert!(cfg.validate().is_ok());

    let (layer, _) = reg.lookup(READ_SIZE).unwrap();
    assert_eq!(layer, Layer::Override);
}

#[test]
fn test_undefined_case_define() {
    let suite = TestSuite::builder("test_undef", "tests/test_undef.toml")
        .case(TestCase::builder("sets_n").define_values("N", [1]))
        .case(TestCase::builder("reads_n"))
        .build();

    // the name is in the table, but only the first case gives it a value
    let case = suite.case("reads_n").unwrap();
    let mut reg = suite.registry();
    case.axes(suite.define_names())
        .install(&mut reg, Layer::Case, 0)
        .unwrap();
    assert_eq!(
        reg.resolve_named("N").unwrap_err(),
        DefineError::Undefined {
            name: "N".to_string()
        }
    );
}

#[test]
fn test_cycle_through_three_defines() {
    let suite = TestSuite::builder("test_cycle", "tests/test_cycle.toml")
        .case(
            TestCase::builder("abc")
                .define_with("A", |reg| reg.resolve_named("B"))
                .define_with("B", |reg| reg.resolve_named("C"))
                .define_with("C", |reg| Ok(reg.resolve_named("A")? + 1)),
        )
        .build();
    let case = suite.case("abc").unwrap();
    let mut reg = suite.registry();
    case.axes(suite.define_names())
        .install(&mut reg, Layer::Case, 0)
        .unwrap();

    match reg.resolve_named("B").unwrap_err() {
        DefineError::Cycle { name, chain } => {
            assert_eq!(name, "B");
            assert_eq!(chain, "B -> C -> A -> B");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // a failed resolve leaves nothing half-resolved behind
    assert!(!reg.is_resolved(reg.index_of("A").unwrap()));
    assert!(matches!(
        reg.resolve_named("A"),
        Err(DefineError::Cycle { .. })
    ));
}
