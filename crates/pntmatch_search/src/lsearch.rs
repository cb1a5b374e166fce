use crate::context::SearchContext;
use crate::eval;
use crate::matching::{Assignment, BAD_MATCH_PENALTY, FULL_EVAL};
use crate::problem::Problem;

/// Outcome of one hill-climbing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A strictly improving modification was committed.
    Improved,
    /// No single-pair modification improves the match; it is locally
    /// optimal.
    NoMove,
    /// The match no longer has enough pairs to determine a pose.
    TooFewPairs,
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Add(usize, usize),
    Remove(usize, usize),
    Swap(usize, usize, usize),
}

/// Try every modification of the current pairing that adds, removes, or
/// swaps a single pair, scoring each against the current best with the
/// evaluator's branch-and-bound cutoff. The best strictly-improving move is
/// committed into the match and context.
///
/// The context must be seeded to the match and `m.error` current. Poses are
/// recovered from the incrementally updated accumulator, never from a full
/// pass, which is why pair contributions must be additive.
pub fn local_search_step(
    problem: &Problem,
    m: &mut Assignment,
    ctx: &mut SearchContext,
) -> StepOutcome {
    let min_pairs = problem.min_pairs();
    if ctx.pairs < min_pairs {
        return StepOutcome::TooFewPairs;
    }

    let model_len = m.data_for.len();
    let data_len = problem.data().len();
    let mut best = m.error;
    let mut best_move: Option<Move> = None;

    for i in 0..model_len {
        let current = m.data_for[i];
        // slot == data_len encodes the removal candidate; everything else
        // pairs this model point with an unpaired data point
        for slot in 0..=data_len {
            let candidate = (slot < data_len).then_some(slot);
            match candidate {
                Some(d) if ctx.paired[d] => continue,
                None if current.is_none() => continue,
                _ => {}
            }
            let pairs_after = match (current, candidate) {
                (Some(_), None) => ctx.pairs - 1,
                (None, Some(_)) => ctx.pairs + 1,
                _ => ctx.pairs,
            };
            if pairs_after < min_pairs {
                continue;
            }

            // candidate accumulator = current − old pair + new pair
            let mut staged = std::mem::take(&mut ctx.cand_partial);
            staged.copy_from_slice(&ctx.partial);
            if let Some(old) = current {
                let contribution = ctx.pair_contribution(problem, i, old);
                for (acc, c) in staged.iter_mut().zip(contribution) {
                    *acc -= c;
                }
            }
            if let Some(new) = candidate {
                let contribution = ctx.pair_contribution(problem, i, new);
                for (acc, c) in staged.iter_mut().zip(contribution) {
                    *acc += c;
                }
            }

            m.data_for[i] = candidate;
            let mut pose = std::mem::take(&mut ctx.cand_pose);
            let score =
                eval::evaluate_with_partial(problem, m.iter_slots(), &staged, &mut pose, best);
            ctx.cand_pose = pose;
            m.data_for[i] = current;
            ctx.cand_partial = staged;

            if score < best {
                best = score;
                best_move = Some(match (current, candidate) {
                    (Some(old), None) => Move::Remove(i, old),
                    (None, Some(new)) => Move::Add(i, new),
                    (Some(old), Some(new)) => Move::Swap(i, old, new),
                    (None, None) => unreachable!("no-op candidate"),
                });
            }
        }
    }

    let Some(chosen) = best_move else {
        return StepOutcome::NoMove;
    };
    match chosen {
        Move::Add(i, d) => {
            ctx.add_pair(problem, i, d);
            m.data_for[i] = Some(d);
        }
        Move::Remove(i, d) => {
            ctx.remove_pair(problem, i, d);
            m.data_for[i] = None;
        }
        Move::Swap(i, old, new) => {
            ctx.remove_pair(problem, i, old);
            ctx.add_pair(problem, i, new);
            m.data_for[i] = Some(new);
        }
    }
    m.error = best;
    // keep the context's pose in sync with the committed pairing
    let mut pose = std::mem::take(&mut ctx.pose);
    let _ = problem.transform().solve_pose(&ctx.partial, &mut pose);
    ctx.pose = pose;
    StepOutcome::Improved
}

/// Hill-climb to a local optimum: seed the context, score the start, and
/// commit improving steps until none exists. Fails when the seed cannot
/// determine a pose.
pub fn local_search(
    problem: &Problem,
    m: &mut Assignment,
    ctx: &mut SearchContext,
) -> Result<(), TooFewPairs> {
    if ctx.seed(problem, m) < problem.min_pairs() {
        m.error = BAD_MATCH_PENALTY;
        return Err(TooFewPairs);
    }
    let mut pose = std::mem::take(&mut ctx.pose);
    m.error = eval::evaluate_with_partial(problem, m.iter_slots(), &ctx.partial, &mut pose, FULL_EVAL);
    ctx.pose = pose;

    loop {
        match local_search_step(problem, m, ctx) {
            StepOutcome::Improved => continue,
            StepOutcome::NoMove => return Ok(()),
            StepOutcome::TooFewPairs => return Err(TooFewPairs),
        }
    }
}

/// The match fell below the transform class's minimum pair count.
#[derive(Debug, Clone, Copy)]
pub struct TooFewPairs;
