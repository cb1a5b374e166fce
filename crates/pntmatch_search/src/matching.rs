use std::cmp::Ordering;

use rand::Rng;

use crate::transform::Pose;

/// Error value marking an invalid evaluation; sorts after every real score.
pub const BAD_MATCH_PENALTY: f64 = 1e20;

/// Matches whose fit error exceeds this are dropped by the search drivers.
pub const DROP_THRESHOLD: f64 = 10_000.0;

/// Cutoff passed to the evaluator when no better bound is known.
pub const FULL_EVAL: f64 = 2e21;

/// One committed model/data pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub model: usize,
    pub data: usize,
}

/// Compact form of a correspondence: only real pairs are stored.
#[derive(Debug, Clone)]
pub struct Correspondence {
    pub pairs: Vec<Pairing>,
    pub error: f64,
    pub pose: Option<Pose>,
    pub trial: usize,
}

impl Correspondence {
    pub fn new(pairs: Vec<Pairing>) -> Self {
        Correspondence {
            pairs,
            error: 0.0,
            pose: None,
            trial: 0,
        }
    }

    pub fn from_indices(pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Correspondence::new(
            pairs
                .into_iter()
                .map(|(model, data)| Pairing { model, data })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Order pairs by model index so positionally compared duplicates are
    /// recognized regardless of discovery order.
    pub fn sort_pairs(&mut self) {
        self.pairs.sort_by_key(|p| p.model);
    }

    pub fn iter_slots(&self) -> impl Iterator<Item = (usize, Option<usize>)> + Clone + '_ {
        self.pairs.iter().map(|p| (p.model, Some(p.data)))
    }
}

/// Expanded form: entry `i` holds the data index paired with model point
/// `i`, or `None`. Operations that walk every model slot (the evaluator,
/// local search) require this form.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub data_for: Vec<Option<usize>>,
    pub error: f64,
    pub pose: Option<Pose>,
    pub trial: usize,
}

impl Assignment {
    pub fn from_compact(c: &Correspondence, model_len: usize) -> Self {
        let mut data_for = vec![None; model_len];
        for p in &c.pairs {
            data_for[p.model] = Some(p.data);
        }
        Assignment {
            data_for,
            error: c.error,
            pose: c.pose.clone(),
            trial: c.trial,
        }
    }

    /// Drop the empty slots. The pose is dropped with them: it was solved
    /// against the slots that existed when it was computed.
    pub fn compact(&self) -> Correspondence {
        Correspondence {
            pairs: self
                .data_for
                .iter()
                .enumerate()
                .filter_map(|(m, d)| d.map(|data| Pairing { model: m, data }))
                .collect(),
            error: self.error,
            pose: None,
            trial: self.trial,
        }
    }

    pub fn pair_count(&self) -> usize {
        self.data_for.iter().filter(|d| d.is_some()).count()
    }

    pub fn iter_slots(&self) -> impl Iterator<Item = (usize, Option<usize>)> + Clone + '_ {
        self.data_for.iter().copied().enumerate()
    }
}

/// Pairwise union of two expanded matches. `None` when they disagree about
/// a pairing in either direction (the one-to-one constraint would break).
pub fn merge(a: &Assignment, b: &Assignment) -> Option<Assignment> {
    let mut out = a.clone();
    out.error = 0.0;
    out.pose = None;
    for (i, db) in b.data_for.iter().enumerate() {
        let Some(db) = *db else { continue };
        match out.data_for[i] {
            Some(da) if da != db => return None,
            Some(_) => continue,
            None => {}
        }
        if out
            .data_for
            .iter()
            .enumerate()
            .any(|(j, d)| j != i && *d == Some(db))
        {
            return None;
        }
        out.data_for[i] = Some(db);
    }
    Some(out)
}

/// Clustering predicate for result dedup: true when at least 75% of the
/// larger match's pairs appear in the other with the same data index.
pub fn same_instance(a: &Correspondence, b: &Correspondence) -> bool {
    let shared = a.pairs.iter().filter(|p| b.pairs.contains(p)).count();
    let larger = a.len().max(b.len());
    shared as f64 > larger as f64 * 0.75
}

/// Scored-match view shared by the compact and expanded forms so the sort
/// and dedup machinery works on either.
pub trait ScoredMatch {
    fn error(&self) -> f64;
    fn pair_count(&self) -> usize;
    fn trial(&self) -> usize;
    fn same_pair_layout(&self, other: &Self) -> bool;
    fn lex_cmp(&self, other: &Self) -> Ordering;
}

impl ScoredMatch for Correspondence {
    fn error(&self) -> f64 {
        self.error
    }

    fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    fn trial(&self) -> usize {
        self.trial
    }

    fn same_pair_layout(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }

    fn lex_cmp(&self, other: &Self) -> Ordering {
        let key = |p: &Pairing| (p.model, p.data);
        self.pairs
            .iter()
            .map(key)
            .cmp(other.pairs.iter().map(key))
    }
}

impl ScoredMatch for Assignment {
    fn error(&self) -> f64 {
        self.error
    }

    fn pair_count(&self) -> usize {
        Assignment::pair_count(self)
    }

    fn trial(&self) -> usize {
        self.trial
    }

    fn same_pair_layout(&self, other: &Self) -> bool {
        self.data_for == other.data_for
    }

    fn lex_cmp(&self, other: &Self) -> Ordering {
        self.data_for.iter().cmp(other.data_for.iter())
    }
}

/// Ranking order: error ascending. Two matches with byte-equal pair lists
/// and near-equal scores are the same match (dedup collapses them); exact
/// score ties between different pairings fall back to size, then to the
/// pair lists themselves so the order stays total.
pub fn compare<M: ScoredMatch>(a: &M, b: &M) -> Ordering {
    let ord = a.error().partial_cmp(&b.error()).unwrap_or(Ordering::Equal);
    if (a.error() - b.error()).abs() < 0.005 {
        if a.same_pair_layout(b) {
            return Ordering::Equal;
        }
        if ord == Ordering::Equal {
            return a
                .pair_count()
                .cmp(&b.pair_count())
                .then_with(|| a.lex_cmp(b));
        }
    }
    ord
}

/// `compare` lifted to dropped-trial slots: `None` sorts last.
pub fn compare_ranked<M: ScoredMatch>(a: &Option<M>, b: &Option<M>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(a, b),
    }
}

/// `compare_ranked`, breaking remaining ties by ascending trial number so
/// the first-discovered equivalent match wins the final ranking.
pub fn compare_by_trial<M: ScoredMatch>(a: &Option<M>, b: &Option<M>) -> Ordering {
    let ord = compare_ranked(a, b);
    if ord != Ordering::Equal {
        return ord;
    }
    match (a, b) {
        (Some(a), Some(b)) => a.trial().cmp(&b.trial()),
        _ => Ordering::Equal,
    }
}

/// Uniformly random one-to-one pairing of `size` model and data indices.
pub fn random_match<R: Rng>(
    rng: &mut R,
    model_len: usize,
    data_len: usize,
    size: usize,
) -> Correspondence {
    let mut model_free = vec![true; model_len];
    let mut data_free = vec![true; data_len];
    let mut pairs = Vec::with_capacity(size);

    for _ in 0..size {
        let mut m = rng.gen_range(0..model_len);
        while !model_free[m] {
            m = (m + 1) % model_len;
        }
        model_free[m] = false;
        let mut d = rng.gen_range(0..data_len);
        while !data_free[d] {
            d = (d + 1) % data_len;
        }
        data_free[d] = false;
        pairs.push(Pairing { model: m, data: d });
    }

    Correspondence::new(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    fn compact(pairs: &[(usize, usize)], error: f64) -> Correspondence {
        let mut c = Correspondence::from_indices(pairs.iter().copied());
        c.error = error;
        c
    }

    #[test]
    fn expand_then_compact_round_trips() {
        let c = compact(&[(0, 3), (2, 1), (5, 4)], 1.25);
        let a = Assignment::from_compact(&c, 8);
        assert_eq!(a.pair_count(), 3);
        let back = a.compact();
        assert_eq!(back.pairs, c.pairs);
        assert_eq!(back.error, c.error);
        assert!(back.pose.is_none());
    }

    #[test]
    fn merge_unions_compatible_matches() {
        let a = Assignment::from_compact(&compact(&[(0, 0), (1, 1)], 0.0), 4);
        let b = Assignment::from_compact(&compact(&[(1, 1), (3, 2)], 0.0), 4);
        let m = merge(&a, &b).unwrap();
        assert_eq!(m.data_for, vec![Some(0), Some(1), None, Some(2)]);
    }

    #[test]
    fn merge_rejects_conflicts() {
        let a = Assignment::from_compact(&compact(&[(0, 0), (1, 1)], 0.0), 4);
        // model 1 mapped elsewhere
        let b = Assignment::from_compact(&compact(&[(1, 2)], 0.0), 4);
        assert!(merge(&a, &b).is_none());
        // data 1 claimed by another model
        let c = Assignment::from_compact(&compact(&[(2, 1)], 0.0), 4);
        assert!(merge(&a, &c).is_none());
    }

    #[test]
    fn same_instance_is_reflexive_and_symmetric() {
        let a = compact(&[(0, 0), (1, 1), (2, 2), (3, 3)], 0.0);
        let b = compact(&[(0, 0), (1, 1), (2, 2), (3, 4)], 0.0);
        let c = compact(&[(0, 5), (1, 6), (2, 7), (3, 8)], 0.0);
        assert!(same_instance(&a, &a));
        assert_eq!(same_instance(&a, &b), same_instance(&b, &a));
        assert!(!same_instance(&a, &c));
        // 3 of 4 pairs shared: exactly at the 75% bound, which is exclusive
        assert!(!same_instance(&a, &b));
    }

    #[test]
    fn compare_orders_by_error_then_ties() {
        let lo = compact(&[(0, 0), (1, 1)], 1.0);
        let hi = compact(&[(0, 0), (1, 1)], 2.0);
        assert_eq!(compare(&lo, &hi), Ordering::Less);

        // identical pair lists within the tolerance window collapse
        let near = compact(&[(0, 0), (1, 1)], 1.004);
        assert_eq!(compare(&lo, &near), Ordering::Equal);

        // equal score, different pairings: smaller match first
        let small = compact(&[(0, 0), (1, 1)], 1.0);
        let large = compact(&[(0, 0), (1, 1), (2, 2)], 1.0);
        assert_eq!(compare(&small, &large), Ordering::Less);
        assert_eq!(compare(&large, &small), Ordering::Greater);
    }

    #[test]
    fn compare_ranked_sorts_dropped_trials_last() {
        let m = Some(compact(&[(0, 0)], 5.0));
        let none: Option<Correspondence> = None;
        assert_eq!(compare_ranked(&none, &m), Ordering::Greater);
        assert_eq!(compare_ranked(&m, &none), Ordering::Less);
        assert_eq!(compare_ranked(&none, &none), Ordering::Equal);
    }

    #[test]
    fn trial_breaks_remaining_ties() {
        let mut a = compact(&[(0, 0), (1, 1)], 1.0);
        a.trial = 7;
        let mut b = a.clone();
        b.trial = 2;
        assert_eq!(compare_by_trial(&Some(a), &Some(b)), Ordering::Greater);
    }

    #[test]
    fn random_match_is_one_to_one() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..50 {
            let m = random_match(&mut rng, 9, 13, 5);
            assert_eq!(m.len(), 5);
            let mut models: Vec<_> = m.pairs.iter().map(|p| p.model).collect();
            let mut datas: Vec<_> = m.pairs.iter().map(|p| p.data).collect();
            models.sort_unstable();
            models.dedup();
            datas.sort_unstable();
            datas.dedup();
            assert_eq!(models.len(), 5);
            assert_eq!(datas.len(), 5);
        }
    }
}
