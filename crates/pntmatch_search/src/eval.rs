use crate::context::SearchContext;
use crate::matching::{Assignment, BAD_MATCH_PENALTY, Correspondence};
use crate::pointset::Point;
use crate::problem::Problem;
use crate::transform::{SingularSystem, pose_to_homogeneous};

/// Residual part of the fit score: squared image-plane distance between
/// each transformed model point and its data point, divided by sigma, plus
/// 1.0 per unpaired model point. `budget` starts at the caller's cutoff and
/// is spent as error accumulates; once it goes negative the evaluation is
/// abandoned and the bad-match penalty returned.
pub fn fitting_error<I>(problem: &Problem, slots: I, pose: &[f64], mut budget: f64) -> f64
where
    I: IntoIterator<Item = (usize, Option<usize>)>,
{
    let model = problem.model();
    let data = problem.data();
    let transform = problem.transform();
    let sigma = problem.sigma;

    let mut err = 0.0;
    let mut pairings = 0usize;
    for (mp, dp) in slots {
        let Some(dp) = dp else {
            budget -= 1.0;
            continue;
        };
        let t = transform.apply(model.get(mp), pose);
        let residual = t.distance_sq(data.get(dp));
        err += residual;
        budget -= residual / sigma;
        if budget < 0.0 {
            return BAD_MATCH_PENALTY;
        }
        pairings += 1;
    }

    err / sigma + (model.len() - pairings) as f64
}

/// Score a match whose accumulator has already been assembled: solve the
/// pose into `pose`, charge the degeneracy penalty (returning early when it
/// alone exceeds the cutoff), then add the fitting error under the
/// remaining budget.
pub fn evaluate_with_partial<I>(
    problem: &Problem,
    slots: I,
    partial: &[f64],
    pose: &mut [f64],
    cutoff: f64,
) -> f64
where
    I: IntoIterator<Item = (usize, Option<usize>)>,
{
    if problem.transform().solve_pose(partial, pose).is_err() {
        return BAD_MATCH_PENALTY;
    }
    let degeneracy = problem
        .transform()
        .degeneracy(&problem.extent, pose, problem.scale);
    if degeneracy > cutoff {
        return degeneracy;
    }
    degeneracy + fitting_error(problem, slots, pose, cutoff - degeneracy)
}

/// Full evaluation of an expanded match: rebuild the context, solve, and
/// score. The pose stays in the context's buffer; the match only records
/// its error.
pub fn evaluate(
    problem: &Problem,
    m: &mut Assignment,
    ctx: &mut SearchContext,
    cutoff: f64,
) -> f64 {
    if ctx.seed(problem, m) < problem.min_pairs() {
        m.error = BAD_MATCH_PENALTY;
        return m.error;
    }
    let mut pose = std::mem::take(&mut ctx.pose);
    m.error = evaluate_with_partial(problem, m.iter_slots(), &ctx.partial, &mut pose, cutoff);
    ctx.pose = pose;
    m.error
}

/// `evaluate` for a compact match.
pub fn evaluate_compact(
    problem: &Problem,
    c: &mut Correspondence,
    ctx: &mut SearchContext,
    cutoff: f64,
) -> f64 {
    if ctx.seed_compact(problem, c) < problem.min_pairs() {
        c.error = BAD_MATCH_PENALTY;
        return c.error;
    }
    let mut pose = std::mem::take(&mut ctx.pose);
    c.error = evaluate_with_partial(problem, c.iter_slots(), &ctx.partial, &mut pose, cutoff);
    ctx.pose = pose;
    c.error
}

/// Map every model point through a pose into a reusable buffer.
pub fn transform_points_into(problem: &Problem, pose: &[f64], out: &mut Vec<Point>) {
    out.clear();
    out.extend(
        problem
            .model()
            .points()
            .iter()
            .map(|&p| problem.transform().apply(p, pose)),
    );
}

/// Recover the pose of a finished match in original image coordinates.
///
/// Search poses live in the normalized frame, so the accumulation is rerun
/// on the unnormalized sets and the result homogenized. Ranked matches do
/// not carry poses; this is the one place a final pose is computed.
pub fn proper_pose(problem: &Problem, c: &Correspondence) -> Result<[f64; 8], SingularSystem> {
    let transform = problem.transform();
    let mut partial = vec![0.0; transform.context_len()];
    let mut scratch = vec![0.0; transform.context_len()];
    for p in &c.pairs {
        let mp = problem.un_model().get(p.model);
        let dp = problem.un_data().get(p.data);
        transform.accumulate_pair(mp.x, mp.y, dp.x, dp.y, &mut scratch);
        for (acc, s) in partial.iter_mut().zip(&scratch) {
            *acc += s;
        }
    }
    let mut pose = vec![0.0; transform.pose_dim()];
    transform.solve_pose(&partial, &mut pose)?;
    Ok(pose_to_homogeneous(problem.kind, &pose))
}
