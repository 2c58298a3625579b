use anyhow::{Context, Result};
use bdtest_lib::cli::commands::{Cli, Commands, RunArgs};
use bdtest_lib::geometry::BUILTIN_GEOMETRIES;
use bdtest_lib::runner::Outcome;
use bdtest_lib::{RunOptions, Runner, Settings, TestSuite};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::Path;

mod suites;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger with specified or default log level
    let env = match cli.log_level {
        Some(ref log_level) => Env::default().filter_or("RUST_LOG", log_level),
        None => Env::default().filter_or("RUST_LOG", "info"),
    };
    env_logger::init_from_env(env);

    let suites = suites::all();

    match cli.command {
        Commands::List { args } => {
            cmd_list(&suites, cli.config.as_deref(), &args)?;
        }
        Commands::Defines { args } => {
            cmd_defines(&suites, cli.config.as_deref(), &args)?;
        }
        Commands::Geometries => {
            cmd_geometries();
        }
        Commands::Run { args } => {
            cmd_run(&suites, cli.config.as_deref(), &args)?;
        }
    }

    Ok(())
}

/// Settings file first, then command-line flags on top
fn load_options(config: Option<&Path>, args: &RunArgs) -> Result<RunOptions> {
    let mut options = match config {
        Some(path) => Settings::load(path)
            .and_then(|settings| settings.to_options())
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => RunOptions::default(),
    };
    args.apply(&mut options);
    Ok(options)
}

fn cmd_list(suites: &[TestSuite], config: Option<&Path>, args: &RunArgs) -> Result<()> {
    let options = load_options(config, args)?;
    let runner = Runner::new(suites, options)?;
    let cases = runner
        .list(&args.tests)
        .with_context(|| "Failed to list tests")?;

    println!("{:<40} {:<10} {:>6}  PATH", "TEST", "FLAGS", "PERMS");
    for case in &cases {
        println!(
            "{:<40} {:<10} {:>6}  {}",
            case.id.to_string(),
            case.flags.to_string(),
            case.permutations,
            case.path
        );
    }
    let total: usize = cases.iter().map(|c| c.permutations).sum();
    println!();
    println!("{} cases, {} permutations", cases.len(), total);

    Ok(())
}

fn cmd_defines(suites: &[TestSuite], config: Option<&Path>, args: &RunArgs) -> Result<()> {
    let options = load_options(config, args)?;
    let runner = Runner::new(suites, options)?;
    let perms = runner
        .defines(&args.tests)
        .with_context(|| "Failed to resolve defines")?;

    for perm in perms {
        let defines: Vec<String> = perm
            .defines
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("{}: {}", perm.id, defines.join(" "));
    }

    Ok(())
}

fn cmd_geometries() {
    let show = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>12}",
        "NAME", "READ_SIZE", "PROG_SIZE", "BLOCK_SIZE", "BLOCK_COUNT"
    );
    for geometry in BUILTIN_GEOMETRIES.iter() {
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>12}",
            geometry.name,
            show(geometry.read_size()),
            show(geometry.prog_size()),
            show(geometry.block_size()),
            show(geometry.block_count())
        );
    }
}

fn cmd_run(suites: &[TestSuite], config: Option<&Path>, args: &RunArgs) -> Result<()> {
    let options = load_options(config, args)?;
    info!(
        "Running with seed={}, geometries={:?}, powerloss={}",
        options.seed, options.geometries, options.powerloss
    );
    let runner = Runner::new(suites, options)?;
    let report = runner.run(&args.tests).with_context(|| "Test run aborted")?;

    for result in report.failures() {
        if let Outcome::Failed { error, powerlosses } = &result.outcome {
            error!("{} failed after {} power losses: {}", result.id, powerlosses, error);
            println!("FAILED {}: {}", result.id, error);
        }
    }
    println!("{}", report);

    if !report.is_success() {
        return Err(anyhow::anyhow!(
            "{} of {} tests failed",
            report.failed(),
            report.executed()
        ));
    }

    Ok(())
}
