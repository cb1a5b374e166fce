use std::cmp::Ordering;

/// Sort with a fixed thread fan-out: the list is split into `fanout` runs,
/// the remote runs are sorted on scoped threads while the caller sorts the
/// first, then the runs are merged linearly. Short lists and `fanout < 2`
/// fall back to a plain sort.
pub fn parallel_sort_by<T, F>(mut items: Vec<T>, fanout: usize, cmp: F) -> Vec<T>
where
    T: Send,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    let len = items.len();
    if fanout < 2 || len < 50 {
        items.sort_unstable_by(|a, b| cmp(a, b));
        return items;
    }

    let base = len / fanout;
    let extra = len % fanout;
    let mut parts: Vec<Vec<T>> = Vec::with_capacity(fanout);
    let mut rest = items;
    for i in 0..fanout {
        let part_len = base + usize::from(i < extra);
        let tail = rest.split_off(part_len);
        parts.push(rest);
        rest = tail;
    }
    debug_assert!(rest.is_empty());

    let cmp = &cmp;
    let parts: Vec<Vec<T>> = std::thread::scope(|scope| {
        let mut iter = parts.into_iter();
        let mut first = iter.next().expect("fanout >= 2");
        let handles: Vec<_> = iter
            .map(|mut part| {
                scope.spawn(move || {
                    part.sort_unstable_by(|a, b| cmp(a, b));
                    part
                })
            })
            .collect();
        first.sort_unstable_by(|a, b| cmp(a, b));
        let mut sorted = vec![first];
        for handle in handles {
            sorted.push(handle.join().expect("sort thread panicked"));
        }
        sorted
    });

    // linear merge; the earliest run wins ties so equal elements keep
    // their relative order
    let mut tails: Vec<std::vec::IntoIter<T>> = parts.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<T>> = tails.iter_mut().map(Iterator::next).collect();
    let mut merged = Vec::with_capacity(len);
    loop {
        let mut best: Option<usize> = None;
        for i in 0..heads.len() {
            if heads[i].is_none() {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let candidate = heads[i].as_ref().expect("checked above");
                    let current = heads[b].as_ref().expect("non-empty head");
                    if cmp(candidate, current) == Ordering::Less {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        let Some(b) = best else { break };
        merged.push(heads[b].take().expect("selected head"));
        heads[b] = tails[b].next();
    }
    merged
}

/// Drop the earlier entry of every adjacent pair that compares equal. On a
/// sorted list this collapses duplicates; the survivor of an equal run is
/// its last element.
pub fn prune_matches<M, F>(list: Vec<M>, cmp: F) -> Vec<M>
where
    F: Fn(&M, &M) -> Ordering,
{
    let mut out = Vec::with_capacity(list.len());
    let mut iter = list.into_iter();
    let Some(mut prev) = iter.next() else {
        return out;
    };
    for cur in iter {
        if cmp(&prev, &cur) != Ordering::Equal {
            out.push(prev);
        }
        prev = cur;
    }
    out.push(prev);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    #[test]
    fn sorts_like_the_standard_sort() {
        let mut rng = SmallRng::seed_from_u64(3);
        for fanout in [2, 3, 4] {
            let items: Vec<u32> = (0..997).map(|_| rng.gen_range(0..500)).collect();
            let mut expected = items.clone();
            expected.sort_unstable();
            let sorted = parallel_sort_by(items, fanout, |a, b| a.cmp(b));
            assert_eq!(sorted, expected);
        }
    }

    #[test]
    fn short_lists_use_the_fallback() {
        let sorted = parallel_sort_by(vec![3, 1, 2], 2, |a, b| a.cmp(b));
        assert_eq!(sorted, vec![1, 2, 3]);
    }

    #[test]
    fn prune_drops_earlier_duplicates() {
        let items = vec![(1, 'a'), (1, 'b'), (2, 'c'), (3, 'd'), (3, 'e'), (3, 'f')];
        let pruned = prune_matches(items, |a, b| a.0.cmp(&b.0));
        assert_eq!(pruned, vec![(1, 'b'), (2, 'c'), (3, 'f')]);
    }

    #[test]
    fn sort_then_prune_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(9);
        let items: Vec<u32> = (0..300).map(|_| rng.gen_range(0..40)).collect();
        let sorted = parallel_sort_by(items, 2, |a, b| a.cmp(b));
        let pruned = prune_matches(sorted, |a, b| a.cmp(b));
        let again = parallel_sort_by(pruned.clone(), 2, |a, b| a.cmp(b));
        let again = prune_matches(again, |a, b| a.cmp(b));
        assert_eq!(pruned, again);
    }
}
