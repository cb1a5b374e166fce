use std::time::Instant;

use rand::{SeedableRng, rngs::SmallRng};

pub mod context;
pub mod error;
pub mod eval;
pub mod keyfeat;
pub mod listproc;
pub mod lsearch;
pub mod matching;
pub mod par_sort;
pub mod pointset;
pub mod problem;
pub mod ransac;
pub mod transform;

pub use error::SearchError;
pub use matching::{
    Assignment, BAD_MATCH_PENALTY, Correspondence, DROP_THRESHOLD, Pairing, same_instance,
};
pub use problem::Problem;

use context::SearchContext;
use keyfeat::Keep;
use matching::compare_by_trial;
use par_sort::parallel_sort_by;
use ransac::RansacScratch;

/// Search algorithms the batch driver can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Key-feature seeds refined by local search; the default.
    KeyFeature,
    /// Random-start local search.
    RandomStart,
    /// Quartet-seeded RANSAC.
    Ransac,
    /// Iterated RANSAC.
    IRansac,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub algorithm: Algorithm,
    /// Trial count for the random-seeded algorithms (default 1000), or the
    /// number of key features to keep (default: the generator's top half;
    /// 0 keeps every survivor).
    pub trials: Option<u64>,
    pub cpus: usize,
    /// Fan-out of the result sort.
    pub sort_fanout: usize,
    /// Fixed RNG seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

/// Ranked results of one batch run. Matches are compact, sorted best-first
/// with trial-number tie-breaking, and stripped of dropped trials.
#[derive(Debug)]
pub struct RunOutcome {
    pub matches: Vec<Correspondence>,
    pub trials: usize,
}

/// Run one matching algorithm over a problem: generate seeds, farm the
/// trials across workers, and rank the survivors.
pub fn run(problem: &Problem, cfg: &RunConfig) -> Result<RunOutcome, SearchError> {
    let mut rng = match cfg.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let cpus = cfg.cpus.max(1);
    let model_len = problem.model().len();

    let seed_timer = Instant::now();
    let search_timer = Instant::now();
    let searched: Vec<Option<Correspondence>> = match cfg.algorithm {
        Algorithm::Ransac => {
            let trials = cfg.trials.unwrap_or(1000) as usize;
            let seeds = ransac::random_quarter_matches(&mut rng, problem, trials);
            log::info!(
                "generated {trials} quartet seeds in {:.3}s",
                seed_timer.elapsed().as_secs_f64()
            );
            listproc::process_list(
                &seeds,
                cpus,
                || RansacScratch::new(problem),
                |scratch, seed| {
                    let mut result = ransac::ransac_actual(problem, scratch, seed)?;
                    result.trial = seed.trial;
                    result.sort_pairs();
                    Some(result)
                },
            )
        }
        Algorithm::IRansac => {
            let trials = cfg.trials.unwrap_or(1000) as usize;
            let seeds = ransac::random_quarter_matches(&mut rng, problem, trials);
            log::info!(
                "generated {trials} quartet seeds in {:.3}s",
                seed_timer.elapsed().as_secs_f64()
            );
            listproc::process_list(
                &seeds,
                cpus,
                || RansacScratch::new(problem),
                |scratch, seed| {
                    let (result, _steps) = ransac::iransac_actual(problem, scratch, seed);
                    let mut result = result?;
                    result.trial = seed.trial;
                    result.sort_pairs();
                    Some(result)
                },
            )
        }
        Algorithm::RandomStart => {
            let trials = cfg.trials.unwrap_or(1000) as usize;
            let seeds = ransac::random_start_matches(&mut rng, problem, trials);
            log::info!(
                "generated {trials} random seeds in {:.3}s",
                seed_timer.elapsed().as_secs_f64()
            );
            local_search_trials(problem, &seeds_to_assignments(&seeds, model_len), cpus)
        }
        Algorithm::KeyFeature => {
            let keep = match cfg.trials {
                Some(0) => Keep::All,
                Some(n) => Keep::Count(n as usize),
                None => Keep::Half,
            };
            let min_pairs = problem.min_pairs();
            let seeds = keyfeat::key_features(problem, min_pairs + 1, keep, cpus)?;
            log::info!(
                "generated {} key features in {:.3}s",
                seeds.len(),
                seed_timer.elapsed().as_secs_f64()
            );
            local_search_trials(problem, &seeds, cpus)
        }
    };

    let trials = searched.len();
    log::info!(
        "searched {trials} trials in {:.3}s",
        search_timer.elapsed().as_secs_f64()
    );

    let sort_timer = Instant::now();
    let ranked = parallel_sort_by(searched, cfg.sort_fanout.max(1), compare_by_trial);
    log::info!(
        "sorted results in {:.3}s",
        sort_timer.elapsed().as_secs_f64()
    );

    Ok(RunOutcome {
        matches: ranked.into_iter().flatten().collect(),
        trials,
    })
}

fn seeds_to_assignments(seeds: &[Correspondence], model_len: usize) -> Vec<Assignment> {
    seeds
        .iter()
        .map(|seed| Assignment::from_compact(seed, model_len))
        .collect()
}

fn local_search_trials(
    problem: &Problem,
    seeds: &[Assignment],
    cpus: usize,
) -> Vec<Option<Correspondence>> {
    listproc::process_list(
        seeds,
        cpus,
        || SearchContext::new(problem),
        |ctx, seed| {
            let mut m = seed.clone();
            if lsearch::local_search(problem, &mut m, ctx).is_err() {
                return None;
            }
            if m.error > DROP_THRESHOLD {
                return None;
            }
            Some(m.compact())
        },
    )
}
