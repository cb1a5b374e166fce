use ndarray::Array2;
use rand::Rng;

use crate::context::SearchContext;
use crate::eval;
use crate::matching::{Correspondence, Pairing, random_match};
use crate::pointset::{Point, PointSet};
use crate::problem::Problem;

/// Per-worker RANSAC scratch: the model-to-data distance table, the taken
/// bitmaps, a buffer for the transformed model, and a search context for
/// pose recovery.
pub struct RansacScratch {
    pub ctx: SearchContext,
    model_taken: Vec<bool>,
    data_taken: Vec<bool>,
    dist: Array2<f64>,
    transformed: Vec<Point>,
}

impl RansacScratch {
    pub fn new(problem: &Problem) -> Self {
        let m = problem.model().len();
        let d = problem.data().len();
        RansacScratch {
            ctx: SearchContext::new(problem),
            model_taken: vec![false; m],
            data_taken: vec![false; d],
            dist: Array2::zeros((m, d)),
            transformed: Vec::with_capacity(m),
        }
    }
}

/// Greedy one-to-one pairing of the transformed model against the data:
/// repeatedly take the globally closest (model, data) entry while its
/// squared distance stays within sigma, committing the pair when neither
/// endpoint is taken and poisoning the entry either way. The result's
/// error is the number of model points left unpaired.
fn closest_match_pairs(scratch: &mut RansacScratch, data: &PointSet, sigma: f64) -> Correspondence {
    let m = scratch.transformed.len();
    let d = data.len();
    scratch.model_taken.fill(false);
    scratch.data_taken.fill(false);

    for i in 0..m {
        for j in 0..d {
            scratch.dist[[i, j]] = scratch.transformed[i].distance_sq(data.get(j));
        }
    }

    let mut pairs = Vec::new();
    loop {
        let mut low = f64::INFINITY;
        let mut best = None;
        for i in 0..m {
            for j in 0..d {
                if scratch.dist[[i, j]] < low {
                    low = scratch.dist[[i, j]];
                    best = Some((i, j));
                }
            }
        }
        let Some((i, j)) = best else { break };
        if low > sigma {
            break;
        }
        // never pull this entry again
        scratch.dist[[i, j]] = sigma * 512.0;
        if scratch.model_taken[i] || scratch.data_taken[j] {
            continue;
        }
        scratch.model_taken[i] = true;
        scratch.data_taken[j] = true;
        pairs.push(Pairing { model: i, data: j });
    }

    let mut result = Correspondence::new(pairs);
    result.error = (m - result.len()) as f64;
    result
}

/// One RANSAC iteration: recover a pose from the probe's pairs, transform
/// the model into data space, and return the closest-pair matching. `None`
/// when the probe cannot determine a pose.
pub fn ransac_actual(
    problem: &Problem,
    scratch: &mut RansacScratch,
    probe: &Correspondence,
) -> Option<Correspondence> {
    if scratch.ctx.seed_compact(problem, probe) < problem.min_pairs() {
        return None;
    }
    let mut pose = std::mem::take(&mut scratch.ctx.pose);
    let solved = problem
        .transform()
        .solve_pose(&scratch.ctx.partial, &mut pose)
        .is_ok();
    if solved {
        eval::transform_points_into(problem, &pose, &mut scratch.transformed);
    }
    scratch.ctx.pose = pose;
    if !solved {
        return None;
    }
    Some(closest_match_pairs(scratch, problem.data(), problem.sigma))
}

/// Iterated RANSAC: feed each result back as the next seed. Stops when
/// three consecutive iterations fail to grow the match, or when an
/// iteration shrinks it, in which case the previous best is returned.
/// The step count comes back alongside the match.
pub fn iransac_actual(
    problem: &Problem,
    scratch: &mut RansacScratch,
    seed: &Correspondence,
) -> (Option<Correspondence>, usize) {
    let mut best = seed.clone();
    let mut steps = 0;
    let mut stable = 0;
    loop {
        let result = match ransac_actual(problem, scratch, &best) {
            Some(result) => result,
            None if steps == 0 => return (None, steps),
            // a shrunken result starved the refit; keep the previous best
            None => return (Some(best), steps),
        };
        steps += 1;
        if result.len() < best.len() {
            return (Some(best), steps);
        }
        if result.len() == best.len() {
            stable += 1;
        } else {
            stable = 0;
        }
        best = result;
        if stable >= 3 {
            return (Some(best), steps);
        }
    }
}

/// Label each point with its quadrant under an x-median then y-median
/// partition of the set.
pub fn quarter_pointset(set: &PointSet) -> Vec<u8> {
    let n = set.len();
    let mut quadrant = vec![0u8; n];
    let mut order: Vec<usize> = (0..n).collect();

    order.sort_by(|&a, &b| {
        set.get(a)
            .x
            .partial_cmp(&set.get(b).x)
            .expect("finite coordinates")
    });
    for &i in &order[n / 2..] {
        quadrant[i] += 1;
    }

    order.sort_by(|&a, &b| {
        set.get(a)
            .y
            .partial_cmp(&set.get(b).y)
            .expect("finite coordinates")
    });
    for &i in &order[n / 2..] {
        quadrant[i] += 2;
    }

    quadrant
}

/// A random quartet seed: one model point from each quadrant, each paired
/// with an independently drawn data point.
pub fn random_quarter_match<R: Rng>(
    rng: &mut R,
    problem: &Problem,
    quadrants: &[u8],
) -> Correspondence {
    let model_len = problem.model().len();
    let data_len = problem.data().len();
    let mut pairs = Vec::with_capacity(4);

    for quadrant in 0..4u8 {
        let members: Vec<usize> = (0..model_len).filter(|&i| quadrants[i] == quadrant).collect();
        let model = if members.is_empty() {
            // a degenerate layout can leave a quadrant empty; fall back to
            // any model point
            rng.gen_range(0..model_len)
        } else {
            members[rng.gen_range(0..members.len())]
        };
        pairs.push(Pairing {
            model,
            data: rng.gen_range(0..data_len),
        });
    }

    let mut seed = Correspondence::new(pairs);
    seed.error = (model_len - 4) as f64;
    seed
}

/// Quartet seeds for a batch of trials, tagged with their trial numbers.
pub fn random_quarter_matches<R: Rng>(
    rng: &mut R,
    problem: &Problem,
    trials: usize,
) -> Vec<Correspondence> {
    let quadrants = quarter_pointset(problem.model());
    (0..trials)
        .map(|n| {
            let mut seed = random_quarter_match(rng, problem, &quadrants);
            seed.trial = n;
            seed
        })
        .collect()
}

/// Random-start seeds for local search: `min_pairs + 1` uniformly random
/// one-to-one pairs per trial.
pub fn random_start_matches<R: Rng>(
    rng: &mut R,
    problem: &Problem,
    trials: usize,
) -> Vec<Correspondence> {
    let size = problem.min_pairs() + 1;
    (0..trials)
        .map(|n| {
            let mut seed = random_match(rng, problem.model().len(), problem.data().len(), size);
            seed.trial = n;
            seed
        })
        .collect()
}

/// Classical RANSAC trial-count estimate: the number of random quartets
/// needed to hit an all-inlier quartet with the given odds, from the
/// expected inlier count (the known solution's size, or 75% of the model).
pub fn expected_ransac_trials(problem: &Problem, odds: f64) -> u64 {
    let pairs = problem
        .solution
        .as_ref()
        .map(|s| s.len() as f64)
        .unwrap_or(problem.model().len() as f64 * 0.75);

    let mut quartets = 1.0;
    let mut inlier_quartets = 1.0;
    for i in 0..4 {
        let k = i as f64;
        quartets *= (problem.model().len() as f64 - k) * (problem.data().len() as f64 - k);
        inlier_quartets *= pairs - k;
    }

    let miss = (quartets - inlier_quartets) / quartets;
    ((1.0 - odds).ln() / miss.ln() + 1.0) as u64
}
