use crate::matching::{Assignment, Correspondence};
use crate::problem::Problem;

/// Per-worker scratch for pose recovery: the accumulated normal-equation
/// sums, a per-pair staging buffer, two pose buffers, and the taken-data
/// bitmap. Allocated once per worker and reused across trials.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub pairs: usize,
    pub partial: Vec<f64>,
    scratch: Vec<f64>,
    pub pose: Vec<f64>,
    pub cand_partial: Vec<f64>,
    pub cand_pose: Vec<f64>,
    pub paired: Vec<bool>,
}

impl SearchContext {
    pub fn new(problem: &Problem) -> Self {
        let transform = problem.transform();
        let context_len = transform.context_len();
        let pose_dim = transform.pose_dim();
        SearchContext {
            pairs: 0,
            partial: vec![0.0; context_len],
            scratch: vec![0.0; context_len],
            pose: vec![0.0; pose_dim],
            cand_partial: vec![0.0; context_len],
            cand_pose: vec![0.0; pose_dim],
            paired: vec![false; problem.data().len()],
        }
    }

    pub fn reset(&mut self) {
        self.pairs = 0;
        self.partial.fill(0.0);
        self.paired.fill(false);
    }

    /// Rebuild the accumulator from a match in O(pairs). Returns the pair
    /// count, which callers check against `min_pairs`.
    pub fn seed(&mut self, problem: &Problem, m: &Assignment) -> usize {
        self.reset();
        for (model, data) in m.iter_slots() {
            if let Some(data) = data {
                self.add_pair(problem, model, data);
            }
        }
        self.pairs
    }

    pub fn seed_compact(&mut self, problem: &Problem, c: &Correspondence) -> usize {
        self.reset();
        for p in &c.pairs {
            self.add_pair(problem, p.model, p.data);
        }
        self.pairs
    }

    /// Stage one pair's contribution and return it. Does not touch the
    /// accumulator; used to build candidate accumulators in local search.
    pub fn pair_contribution(&mut self, problem: &Problem, model: usize, data: usize) -> &[f64] {
        let mp = problem.model().get(model);
        let dp = problem.data().get(data);
        problem
            .transform()
            .accumulate_pair(mp.x, mp.y, dp.x, dp.y, &mut self.scratch);
        &self.scratch
    }

    pub fn add_pair(&mut self, problem: &Problem, model: usize, data: usize) {
        self.pair_contribution(problem, model, data);
        for (acc, s) in self.partial.iter_mut().zip(&self.scratch) {
            *acc += s;
        }
        self.paired[data] = true;
        self.pairs += 1;
    }

    pub fn remove_pair(&mut self, problem: &Problem, model: usize, data: usize) {
        self.pair_contribution(problem, model, data);
        for (acc, s) in self.partial.iter_mut().zip(&self.scratch) {
            *acc -= s;
        }
        self.paired[data] = false;
        self.pairs -= 1;
    }
}
