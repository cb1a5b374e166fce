use parking_lot::Mutex;
use std::sync::Arc;

/// Worker-pool size: the `NUMBER_OF_PROCESSORS` environment variable when
/// set, otherwise the OS-reported parallelism.
pub fn num_processors() -> usize {
    if let Ok(value) = std::env::var("NUMBER_OF_PROCESSORS") {
        if let Ok(n) = value.trim().parse::<usize>() {
            if n > 0 {
                return n;
            }
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Reserve section of the list: the only shared-mutable scheduling state,
/// guarded by a single mutex held across constant-time arithmetic only.
struct Reserve {
    next: usize,
    finished: usize,
}

/// Apply `process` to every item, farming the list across `cpus` workers,
/// and return the results in item order.
///
/// Each worker owns one `make_scratch()` value for its lifetime. The
/// initial assignment hands worker `w` every `cpus`-th item across the
/// front 75% of the list; the caller is expected to front-load expensive
/// items, and striding balances that load without any locking. A worker
/// that exhausts its stride takes chunks from the remaining reserve:
/// `remaining / (cpus - finished)` while fewer than half the workers have
/// hit the reserve, `remaining / (cpus / 2)` after that, never fewer than
/// 5 items. Stolen chunks are consumed with stride 1.
///
/// No cancellation, no timeouts, no cross-worker ordering guarantee. The
/// calling thread is reused as worker 0.
pub fn process_list<T, S, R, FS, F>(items: &[T], cpus: usize, make_scratch: FS, process: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    FS: Fn() -> S + Sync,
    F: Fn(&mut S, &T) -> R + Sync,
{
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }
    if cpus <= 1 {
        let mut scratch = make_scratch();
        return items.iter().map(|item| process(&mut scratch, item)).collect();
    }

    // items per worker in the strided phase
    let stride_len = (len * 3 / 4) / cpus;
    let reserve = Mutex::new(Reserve {
        next: (cpus * stride_len + cpus).min(len),
        finished: 0,
    });

    let mut collected: Vec<Vec<(usize, R)>> = std::thread::scope(|scope| {
        let reserve = &reserve;
        let make_scratch = &make_scratch;
        let process = &process;

        let worker = move |id: usize| -> Vec<(usize, R)> {
            let mut scratch = make_scratch();
            let mut out = Vec::new();
            let mut next = id;
            let mut last = (cpus * stride_len + id).min(len.saturating_sub(1));
            let mut inc = cpus;

            loop {
                if next > last {
                    let mut r = reserve.lock();
                    if r.next >= len {
                        break;
                    }
                    let remaining = len - r.next;
                    let take = if r.finished < cpus / 2 {
                        remaining / (cpus - r.finished)
                    } else {
                        remaining / (cpus / 2).max(1)
                    };
                    let take = take.max(5);
                    next = r.next;
                    r.next = (r.next + take).min(len);
                    r.finished += 1;
                    drop(r);
                    last = (next + take - 1).min(len - 1);
                    inc = 1;
                }
                out.push((next, process(&mut scratch, &items[next])));
                next += inc;
            }
            out
        };
        let worker = Arc::new(worker);

        let handles: Vec<_> = (1..cpus)
            .map(|id| {
                let worker = Arc::clone(&worker);
                scope.spawn(move || worker(id))
            })
            .collect();
        let mut parts = vec![worker(0)];
        for handle in handles {
            parts.push(handle.join().expect("worker thread panicked"));
        }
        parts
    });

    let mut slots: Vec<Option<R>> = (0..len).map(|_| None).collect();
    for part in collected.drain(..) {
        for (idx, result) in part {
            debug_assert!(slots[idx].is_none(), "item {idx} processed twice");
            slots[idx] = Some(result);
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("every item processed exactly once"))
        .collect()
}
