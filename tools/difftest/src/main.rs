//! Differential sweep of compiled lowerings against the interpreter.

use std::process::ExitCode;

use anyhow::bail;
use clap::Parser;
use ppujit_decode::InsnClass;
use ppujit_difftest::{DiffConfig, Harness};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "ppujit-difftest",
    about = "Compare compiled single-instruction units against the reference interpreter"
)]
struct Args {
    /// Seed for the input generator; rerun with the same seed to reproduce
    #[arg(long, default_value_t = DiffConfig::default().seed)]
    seed: u64,

    /// Random inputs per instruction class
    #[arg(long, default_value_t = DiffConfig::default().cases_per_class)]
    cases: u32,

    /// Only sweep these classes (by mnemonic, repeatable)
    #[arg(long = "class", value_name = "NAME")]
    classes: Vec<String>,

    /// Skip the IR optimizer
    #[arg(long)]
    no_opt: bool,

    /// Mismatch dumps printed per class
    #[arg(long, default_value_t = DiffConfig::default().max_samples)]
    samples: usize,

    /// List the classes that can be swept and exit
    #[arg(long)]
    list: bool,
}

fn select(names: &[String]) -> anyhow::Result<Vec<InsnClass>> {
    let all = Harness::classes();
    if names.is_empty() {
        return Ok(all);
    }
    let mut picked = Vec::with_capacity(names.len());
    for name in names {
        match all.iter().find(|c| c.name().eq_ignore_ascii_case(name)) {
            Some(&c) => picked.push(c),
            None => bail!("{name:?} is not a directly lowered class (see --list)"),
        }
    }
    Ok(picked)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.list {
        for c in Harness::classes() {
            println!("{}", c.name());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let classes = select(&args.classes)?;
    let mut harness = Harness::new(DiffConfig {
        seed: args.seed,
        cases_per_class: args.cases,
        optimize: !args.no_opt,
        max_samples: args.samples,
    })?;
    info!(seed = args.seed, classes = classes.len(), "starting sweep");
    let report = harness.run_classes(&classes);

    print!("{}", report.summary());
    for c in report.classes.iter().filter(|c| c.is_failing()) {
        for m in &c.samples {
            println!("\n{m}");
        }
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
