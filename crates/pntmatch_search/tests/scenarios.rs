use pntmatch_parser::{ProblemConfig, TransformRequest};
use rand::{Rng, SeedableRng, rngs::SmallRng};

use pntmatch_search::eval::proper_pose;
use pntmatch_search::pointset::{Point, PointSet};
use pntmatch_search::ransac::{RansacScratch, ransac_actual};
use pntmatch_search::transform::TransformModel;
use pntmatch_search::transform::similarity::Similarity;
use pntmatch_search::{
    Algorithm, BAD_MATCH_PENALTY, Correspondence, Problem, RunConfig, run, same_instance,
};

fn config(transform: TransformRequest, sigma: f64, instances: usize) -> ProblemConfig {
    ProblemConfig {
        model: "m.pnt".into(),
        data: "d.pnt".into(),
        transform,
        sigma,
        instances,
        spurious: true,
        scale: 2.0,
        solution: None,
        name: Some("scenario".into()),
    }
}

fn run_config(algorithm: Algorithm, trials: Option<u64>, cpus: usize) -> RunConfig {
    RunConfig {
        algorithm,
        trials,
        cpus,
        sort_fanout: 2,
        seed: Some(1234),
    }
}

fn random_points(n: usize, seed: u64) -> Vec<Point> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
        .collect()
}

#[test]
fn identity_projective_recovers_the_full_match() {
    let points = random_points(10, 21);
    let problem = Problem::from_config(
        config(TransformRequest::Projective, 5.0, 1),
        PointSet::new(points.clone()),
        PointSet::new(points),
    )
    .unwrap();

    let outcome = run(&problem, &run_config(Algorithm::KeyFeature, None, 2)).unwrap();
    let best = &outcome.matches[0];
    assert_eq!(best.len(), 10);
    assert!(best.error < 1e-4, "error {}", best.error);
    for pair in &best.pairs {
        assert_eq!(pair.model, pair.data);
    }

    let pose = proper_pose(&problem, best).unwrap();
    let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
    for (got, want) in pose.iter().zip(identity) {
        assert!((got - want).abs() < 1e-3, "pose {pose:?}");
    }
}

#[test]
fn known_similarity_pose_is_recovered() {
    let angle = 30.0_f64.to_radians();
    let truth = [1.2 * angle.cos(), 1.2 * angle.sin(), 5.0, 7.0];
    let model = random_points(8, 33);
    let data: Vec<Point> = model.iter().map(|&p| Similarity.apply(p, &truth)).collect();

    let problem = Problem::from_config(
        config(TransformRequest::Similarity, 1.0, 1),
        PointSet::new(model),
        PointSet::new(data),
    )
    .unwrap();

    let outcome = run(&problem, &run_config(Algorithm::KeyFeature, None, 2)).unwrap();
    let best = &outcome.matches[0];
    assert_eq!(best.len(), 8);

    let pose = proper_pose(&problem, best).unwrap();
    let expected = [
        truth[0], -truth[1], truth[2], truth[1], truth[0], truth[3], 0.0, 0.0,
    ];
    for (got, want) in pose.iter().zip(expected) {
        assert!((got - want).abs() < 1e-3, "pose {pose:?}");
    }
}

#[test]
fn ransac_recovers_true_pairs_among_outliers() {
    let model = random_points(6, 55);
    let mut data = model.clone();
    let mut rng = SmallRng::seed_from_u64(77);
    for _ in 0..20 {
        // keep outliers clear of the true points so the greedy pairing is
        // unambiguous
        loop {
            let candidate = Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0));
            if model.iter().all(|p| p.distance_sq(candidate) > 100.0) {
                data.push(candidate);
                break;
            }
        }
    }
    let problem = Problem::from_config(
        config(TransformRequest::Similarity, 2.0, 1),
        PointSet::new(model),
        PointSet::new(data),
    )
    .unwrap();

    // a trial whose quartet seed is four true correspondences recovers
    // every inlier in one pass
    let mut scratch = RansacScratch::new(&problem);
    let probe = Correspondence::from_indices([(0, 0), (1, 1), (2, 2), (3, 3)]);
    let result = ransac_actual(&problem, &mut scratch, &probe).unwrap();
    assert!(result.len() >= 6);
    assert!(result.error < 6.5, "error {}", result.error);
    for i in 0..6 {
        assert!(result.pairs.iter().any(|p| p.model == i && p.data == i));
    }

    // the full 500-trial batch completes and ranks whatever it found
    let outcome = run(&problem, &run_config(Algorithm::Ransac, Some(500), 2)).unwrap();
    assert_eq!(outcome.trials, 500);
    assert!(!outcome.matches.is_empty());
    for window in outcome.matches.windows(2) {
        assert!(window[0].error <= window[1].error + 0.005);
    }
}

#[test]
fn two_instances_are_reported_separately() {
    let model = vec![
        Point::new(0.0, 0.0),
        Point::new(10.0, 1.0),
        Point::new(6.0, 8.0),
        Point::new(-4.0, 6.0),
        Point::new(3.0, -5.0),
    ];
    // two disjoint rotated + translated copies of the model
    let pose_a = [30.0_f64.to_radians().cos(), 30.0_f64.to_radians().sin(), 20.0, 15.0];
    let pose_b = [
        -45.0_f64.to_radians().cos(),
        -45.0_f64.to_radians().sin(),
        80.0,
        70.0,
    ];
    let mut data: Vec<Point> = model.iter().map(|&p| Similarity.apply(p, &pose_a)).collect();
    data.extend(model.iter().map(|&p| Similarity.apply(p, &pose_b)));

    let problem = Problem::from_config(
        config(TransformRequest::Similarity, 1.0, 2),
        PointSet::new(model),
        PointSet::new(data),
    )
    .unwrap();

    let outcome = run(&problem, &run_config(Algorithm::KeyFeature, None, 2)).unwrap();

    // walk the ranked list the way the reporter does
    let mut emitted: Vec<&Correspondence> = Vec::new();
    for m in &outcome.matches {
        if emitted.len() >= problem.instances {
            break;
        }
        if emitted.last().is_some_and(|prev| same_instance(prev, m)) {
            continue;
        }
        emitted.push(m);
    }

    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].len(), 5);
    assert_eq!(emitted[1].len(), 5);
    assert!(!same_instance(emitted[0], emitted[1]));
}

#[test]
fn underdetermined_matches_are_dropped() {
    let points = random_points(8, 91);
    let problem = Problem::from_config(
        config(TransformRequest::Projective, 5.0, 1),
        PointSet::new(points.clone()),
        PointSet::new(points),
    )
    .unwrap();

    let mut m = pntmatch_search::Assignment::from_compact(
        &Correspondence::from_indices([(0, 0), (1, 1), (2, 2)]),
        problem.model().len(),
    );
    let mut ctx = pntmatch_search::context::SearchContext::new(&problem);
    let error = pntmatch_search::eval::evaluate(
        &problem,
        &mut m,
        &mut ctx,
        pntmatch_search::matching::FULL_EVAL,
    );
    assert_eq!(error, BAD_MATCH_PENALTY);
}

#[test]
fn thread_count_does_not_change_the_winner() {
    let points = random_points(9, 13);
    let make_problem = || {
        Problem::from_config(
            config(TransformRequest::Similarity, 2.0, 1),
            PointSet::new(points.clone()),
            PointSet::new(points.clone()),
        )
        .unwrap()
    };

    let single = run(
        &make_problem(),
        &run_config(Algorithm::RandomStart, Some(200), 1),
    )
    .unwrap();
    let quad = run(
        &make_problem(),
        &run_config(Algorithm::RandomStart, Some(200), 4),
    )
    .unwrap();

    let a = &single.matches[0];
    let b = &quad.matches[0];
    assert_eq!(a.error, b.error);
    assert_eq!(a.pairs, b.pairs);
}
