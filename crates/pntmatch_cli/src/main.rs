use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pntmatch_search::listproc::num_processors;
use pntmatch_search::{Algorithm, Problem, RunConfig, run};

mod report;

/// Offline 2-D point-pattern matcher. The search algorithm is chosen by
/// the name the binary is invoked under: `ransac`, `iransac`, and
/// `pntmatch_rs` (random-start local search) are usually soft links; any
/// other name runs key-feature local search.
#[derive(Parser)]
#[command(name = "pntmatch")]
struct Args {
    /// Problem description file
    problem: PathBuf,
    /// Trial count for the random-seeded algorithms, or how many key
    /// features to search
    trials: Option<u64>,
}

fn main() {
    init_logging();
    if let Err(error) = run_matcher() {
        log::error!("{error:#}");
        std::process::exit(1);
    }
}

fn run_matcher() -> anyhow::Result<()> {
    let algorithm = algorithm_from_invocation();
    let args = Args::parse();

    let problem = Problem::load(&args.problem)
        .with_context(|| format!("problem description {}", args.problem.display()))?;

    let cpus = num_processors();
    log::info!("running on {cpus} processor(s)");

    let cfg = RunConfig {
        algorithm,
        trials: args.trials,
        cpus,
        sort_fanout: 2,
        seed: None,
    };
    let outcome = run(&problem, &cfg)?;

    report::print_report(&problem, &outcome);
    let dir = report::write_html_report(&problem, &outcome)
        .context("writing the HTML report")?;
    log::info!("wrote {}", dir.display());
    Ok(())
}

fn algorithm_from_invocation() -> Algorithm {
    let invoked = std::env::args().next().unwrap_or_default();
    let name = PathBuf::from(invoked);
    match name.file_stem().and_then(|s| s.to_str()) {
        Some("ransac") => Algorithm::Ransac,
        Some("iransac") => Algorithm::IRansac,
        Some("pntmatch_rs") => Algorithm::RandomStart,
        _ => Algorithm::KeyFeature,
    }
}

fn init_logging() {
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply();
    if result.is_err() {
        eprintln!("logger already initialized");
    }
}
