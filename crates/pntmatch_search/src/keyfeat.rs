use ndarray::Array2;

use crate::context::SearchContext;
use crate::error::SearchError;
use crate::eval;
use crate::listproc::process_list;
use crate::lsearch::{self, StepOutcome};
use crate::matching::{
    self, Assignment, Correspondence, DROP_THRESHOLD, Pairing, compare_ranked,
};
use crate::par_sort::{parallel_sort_by, prune_matches};
use crate::pointset::PointSet;
use crate::problem::Problem;

/// How much of the ranked candidate list to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Every non-degenerate candidate.
    All,
    /// The better half of the list; the default heuristic.
    Half,
    /// At most this many candidates.
    Count(usize),
}

impl Keep {
    fn resolve(self, survivors: usize, total: usize) -> usize {
        match self {
            Keep::All => survivors,
            Keep::Half => survivors.min(total / 2),
            Keep::Count(n) => n.min(survivors),
        }
    }
}

/// For each point, its index followed by the indices of its `k - 1`
/// nearest neighbors, found through a brute-force squared-distance table.
pub fn neighbor_clusters(set: &PointSet, k: usize) -> Vec<Vec<usize>> {
    let n = set.len();
    let mut dist = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        dist[[i, i]] = f64::INFINITY;
        for j in 0..i {
            let d = set.get(i).distance_sq(set.get(j));
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }

    let mut clusters = Vec::with_capacity(n);
    for i in 0..n {
        let mut order: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        order.sort_by(|&a, &b| dist[[i, a]].partial_cmp(&dist[[i, b]]).expect("finite"));
        let mut cluster = Vec::with_capacity(k);
        cluster.push(i);
        cluster.extend(order.into_iter().take(k - 1));
        clusters.push(cluster);
    }
    clusters
}

/// All orderings of `0..n`. Grows as n!; callers bound n by the key
/// feature size. `n == 0` yields nothing (callers reject it up front).
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![vec![0]];
    }
    let shorter = permutations(n - 1);
    let mut out = Vec::with_capacity(shorter.len() * n);
    for perm in &shorter {
        for pos in 0..n {
            let mut next = Vec::with_capacity(n);
            next.extend_from_slice(&perm[..pos]);
            next.push(n - 1);
            next.extend_from_slice(&perm[pos..]);
            out.push(next);
        }
    }
    out
}

/// Expand each cluster into every ordering of its tail, head fixed. Pairing
/// the permuted clusters of one set against the plain clusters of the other
/// enumerates all ways of matching the two neighborhoods.
pub fn cluster_permutations(clusters: Vec<Vec<usize>>, k: usize) -> Vec<Vec<usize>> {
    let perms = permutations(k - 1);
    let mut out = Vec::with_capacity(clusters.len() * perms.len());
    for cluster in &clusters {
        for perm in &perms {
            let mut next = Vec::with_capacity(k);
            next.push(cluster[0]);
            next.extend(perm.iter().map(|&p| cluster[p + 1]));
            out.push(next);
        }
    }
    out
}

/// Generate and rank key-feature seed matches of size `pairs`.
///
/// Clusters are built on both sets, the smaller side is permuted, and every
/// (model cluster, data cluster) product is evaluated in parallel with a
/// full pose solve. Candidates scoring past the drop threshold become holes
/// that sort to the end; the rest are ranked, cut down per `keep`, expanded
/// to assignments over the whole model, and tagged with their list position
/// as the trial number.
pub fn key_features(
    problem: &Problem,
    pairs: usize,
    keep: Keep,
    cpus: usize,
) -> Result<Vec<Assignment>, SearchError> {
    let model_len = problem.model().len();
    let data_len = problem.data().len();
    let max = model_len.min(data_len);
    if pairs < 2 || pairs > max {
        return Err(SearchError::KeyFeatureSize { got: pairs, max });
    }

    let mut model_clusters = neighbor_clusters(problem.model(), pairs);
    let mut data_clusters = neighbor_clusters(problem.data(), pairs);
    if model_clusters.len() < data_clusters.len() {
        model_clusters = cluster_permutations(model_clusters, pairs);
    } else {
        data_clusters = cluster_permutations(data_clusters, pairs);
    }

    let mut candidates = Vec::with_capacity(model_clusters.len() * data_clusters.len());
    for mc in &model_clusters {
        for dc in &data_clusters {
            candidates.push(Correspondence::new(
                mc.iter()
                    .zip(dc)
                    .map(|(&model, &data)| Pairing { model, data })
                    .collect(),
            ));
        }
    }
    log::debug!("evaluating {} key feature candidates", candidates.len());

    let evaluated: Vec<Option<Correspondence>> = process_list(
        &candidates,
        cpus,
        || SearchContext::new(problem),
        |ctx, candidate| {
            let mut m = candidate.clone();
            let error = eval::evaluate_compact(problem, &mut m, ctx, DROP_THRESHOLD);
            (error <= DROP_THRESHOLD).then_some(m)
        },
    );

    let total = evaluated.len();
    let ranked = parallel_sort_by(evaluated, 2, compare_ranked);
    let survivors = ranked.iter().take_while(|m| m.is_some()).count();
    let want = keep.resolve(survivors, total);
    log::info!("keeping {want} of {survivors} non-degenerate key features");

    Ok(ranked
        .into_iter()
        .take(want)
        .enumerate()
        .map(|(i, m)| {
            let m = m.expect("survivor boundary respected");
            let mut a = Assignment::from_compact(&m, model_len);
            a.trial = i;
            a
        })
        .collect())
}

/// `key_features`, then one local-search step per unique survivor, dropping
/// matches that are still degenerate, and a final rank/prune/cut pass.
pub fn improved_key_features(
    problem: &Problem,
    pairs: usize,
    keep: Keep,
    cpus: usize,
) -> Result<Vec<Assignment>, SearchError> {
    let features = key_features(problem, pairs, Keep::All, cpus)?;
    log::info!("got {} non-degenerate features", features.len());
    let features = prune_matches(features, matching::compare);
    log::info!("got {} unique features", features.len());

    let stepped: Vec<Option<Assignment>> = process_list(
        &features,
        cpus,
        || SearchContext::new(problem),
        |ctx, feature: &Assignment| {
            let mut m = feature.clone();
            if ctx.seed(problem, &m) < problem.min_pairs() {
                return None;
            }
            if lsearch::local_search_step(problem, &mut m, ctx) == StepOutcome::TooFewPairs {
                return None;
            }
            (m.error <= DROP_THRESHOLD).then_some(m)
        },
    );

    let total = stepped.len();
    let ranked = parallel_sort_by(stepped, 2, compare_ranked);
    let survivors = ranked.iter().take_while(|m| m.is_some()).count();
    let kept: Vec<Assignment> = ranked.into_iter().take(survivors).flatten().collect();
    let kept = prune_matches(kept, matching::compare);
    log::info!("got {} unique features after one-step", kept.len());

    let want = keep.resolve(kept.len(), total);
    Ok(kept
        .into_iter()
        .take(want)
        .enumerate()
        .map(|(i, mut m)| {
            m.trial = i;
            m
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pntmatch_parser::{ProblemConfig, TransformRequest};

    use crate::pointset::Point;

    #[test]
    fn permutation_counts_are_factorials() {
        assert!(permutations(0).is_empty());
        assert_eq!(permutations(1).len(), 1);
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(4).len(), 24);
        // all distinct
        let mut perms = permutations(4);
        perms.sort();
        perms.dedup();
        assert_eq!(perms.len(), 24);
    }

    #[test]
    fn clusters_pick_the_nearest_neighbors() {
        let set = PointSet::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(0.0, 1.5),
        ]);
        let clusters = neighbor_clusters(&set, 3);
        assert_eq!(clusters[0], vec![0, 1, 3]);
        assert_eq!(clusters[2], vec![2, 1, 0]);
    }

    #[test]
    fn cluster_permutations_fix_the_head() {
        let expanded = cluster_permutations(vec![vec![7, 1, 2]], 3);
        assert_eq!(expanded.len(), 2);
        for cluster in &expanded {
            assert_eq!(cluster[0], 7);
        }
        assert!(expanded.contains(&vec![7, 1, 2]));
        assert!(expanded.contains(&vec![7, 2, 1]));
    }

    fn identity_problem(points: Vec<Point>) -> Problem {
        Problem::from_config(
            ProblemConfig {
                model: "m.pnt".into(),
                data: "d.pnt".into(),
                transform: TransformRequest::Similarity,
                sigma: 1.0,
                instances: 1,
                spurious: false,
                scale: 2.0,
                solution: None,
                name: None,
            },
            PointSet::new(points.clone()),
            PointSet::new(points),
        )
        .unwrap()
    }

    #[test]
    fn key_features_rank_the_true_neighborhood_first() {
        let p = identity_problem(vec![
            Point::new(0.0, 0.0),
            Point::new(12.0, 3.0),
            Point::new(5.0, 14.0),
            Point::new(-8.0, 6.0),
            Point::new(3.0, -9.0),
            Point::new(-4.0, -6.0),
        ]);
        let features = key_features(&p, 3, Keep::All, 2).unwrap();
        assert!(!features.is_empty());
        // trial numbers trace list positions
        for (i, f) in features.iter().enumerate() {
            assert_eq!(f.trial, i);
            assert_eq!(f.data_for.len(), p.model().len());
        }
        // the best feature is an identity neighborhood: no residual, only
        // the three unpaired model points
        let best = &features[0];
        for (m, d) in best.iter_slots() {
            if let Some(d) = d {
                assert_eq!(m, d);
            }
        }
        assert!((best.error - 3.0).abs() < 1e-6, "error {}", best.error);
    }

    #[test]
    fn keep_count_caps_the_list() {
        let p = identity_problem(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(5.0, 3.0),
        ]);
        let features = key_features(&p, 3, Keep::Count(4), 1).unwrap();
        assert!(features.len() <= 4);
    }

    #[test]
    fn degenerate_sizes_are_rejected() {
        let p = identity_problem(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(matches!(
            key_features(&p, 0, Keep::All, 1),
            Err(SearchError::KeyFeatureSize { .. })
        ));
        assert!(matches!(
            key_features(&p, 1, Keep::All, 1),
            Err(SearchError::KeyFeatureSize { .. })
        ));
        assert!(matches!(
            key_features(&p, 9, Keep::All, 1),
            Err(SearchError::KeyFeatureSize { .. })
        ));
    }

    #[test]
    fn improved_features_survive_one_step() {
        let p = identity_problem(vec![
            Point::new(0.0, 0.0),
            Point::new(12.0, 3.0),
            Point::new(5.0, 14.0),
            Point::new(-8.0, 6.0),
            Point::new(3.0, -9.0),
        ]);
        let features = improved_key_features(&p, 3, Keep::All, 2).unwrap();
        assert!(!features.is_empty());
        for f in &features {
            assert!(f.error <= DROP_THRESHOLD);
        }
    }
}
