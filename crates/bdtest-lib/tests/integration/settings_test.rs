use bdtest_lib::cli::commands::RunArgs;
use bdtest_lib::powerloss::PowerLossSchedule;
use bdtest_lib::{Settings, SettingsError, TestCase, TestSuite};
use tempfile::TempDir;

use crate::common::{run_all, Recorder};

fn write_settings(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("bdtest.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_settings_drive_a_run() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        r#"
geometries = ["nor", "nand"]

[defines]
N = "range(1,4)"
"#,
    );
    let options = Settings::load(&path).unwrap().to_options().unwrap();

    let seen = Recorder::new();
    let record = seen.clone();
    let suites = vec![TestSuite::builder("test_cfg", "tests/test_cfg.toml")
        .case(
            TestCase::builder("test_cfg_n")
                .define_values("N", [100])
                .run(move |ctx| {
                    let n = ctx.define_named("N")?;
                    record.push((n, ctx.cfg().block_size));
                    Ok(())
                }),
        )
        .build()];

    let report = run_all(&suites, options);
    assert_eq!(report.passed(), 6);
    assert_eq!(
        seen.take(),
        vec![
            (1, 4096),
            (2, 4096),
            (3, 4096),
            (1, 32768),
            (2, 32768),
            (3, 32768)
        ]
    );
}

#[test]
fn test_flags_override_settings() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        r#"
seed = 5
powerloss = "linear"

[defines]
N = [1, 2]
"#,
    );
    let mut options = Settings::load(&path).unwrap().to_options().unwrap();

    let args = RunArgs {
        defines: vec!["N=9".parse().unwrap()],
        powerloss: Some(PowerLossSchedule::Log),
        ..RunArgs::default()
    };
    args.apply(&mut options);

    assert_eq!(options.seed, 5);
    assert_eq!(options.powerloss, PowerLossSchedule::Log);
    assert_eq!(options.overrides.get("N").unwrap().values, vec![9]);
}

#[test]
fn test_bad_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "seed = \"not a number\"");
    assert!(matches!(
        Settings::load(&path),
        Err(SettingsError::TomlParse(_))
    ));

    let path = write_settings(&dir, "[defines]\nN = \"range(1,2,0)\"");
    let err = Settings::load(&path).unwrap().to_options().unwrap_err();
    assert!(err.to_string().contains("step must not be zero"));
}
