// THEORY:
// The `fan_out` module is the parallel execution layer shared by every stage that
// evaluates many independent items per frame: contours in the light-bar
// extractor, light-bar pairs in the armor matcher and candidates in the selector.
//
// Key architectural principles:
// 1.  **Batch Dispatch**: Work items are dealt round-robin into one batch per
//     worker (at most one per CPU) and every batch runs on the tokio blocking pool.
//     Dispatching batches instead of single items amortizes the spawn cost, which
//     matters when the per-item work is a handful of float comparisons.
// 2.  **Barrier Semantics**: `for_each_parallel` only returns after every batch has
//     finished, so a stage never hands a partial result to the next one.
// 3.  **Reduction Sinks**: Workers never share state with each other. The only
//     shared, mutable structure is the sink they write to: an append-only
//     `AppendSink` or a priority-ordered `MaxSink`. Arrival order is
//     nondeterministic, the content is not.

use futures::future::join_all;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Runs `work` once for every item, spread over the tokio blocking pool, and
/// waits for all of them. A panic inside `work` is re-raised here.
pub async fn for_each_parallel<T, F>(items: Vec<T>, work: F)
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    if items.is_empty() {
        return;
    }

    let worker_count = num_cpus::get().max(1).min(items.len());
    let mut batches: Vec<Vec<T>> = (0..worker_count)
        .map(|_| Vec::with_capacity(items.len() / worker_count + 1))
        .collect();
    for (index, item) in items.into_iter().enumerate() {
        batches[index % worker_count].push(item);
    }

    let work = Arc::new(work);
    let handles = batches.into_iter().map(|batch| {
        let work = Arc::clone(&work);
        tokio::task::spawn_blocking(move || {
            for item in batch {
                work(item);
            }
        })
    });

    for joined in join_all(handles).await {
        if let Err(error) = joined {
            if error.is_panic() {
                std::panic::resume_unwind(error.into_panic());
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A worker that panicked mid-push cannot leave a Vec or heap half-written.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe append-only collection. Clones share the same storage.
#[derive(Debug)]
pub struct AppendSink<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for AppendSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> AppendSink<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    pub fn push(&self, item: T) {
        lock(&self.items).push(item);
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves everything collected so far out of the sink.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *lock(&self.items))
    }
}

/// Thread-safe priority reduction: keeps every pushed item and hands back the
/// greatest one first. Clones share the same heap.
#[derive(Debug)]
pub struct MaxSink<T: Ord> {
    heap: Arc<Mutex<BinaryHeap<T>>>,
}

impl<T: Ord> Clone for MaxSink<T> {
    fn clone(&self) -> Self {
        Self {
            heap: Arc::clone(&self.heap),
        }
    }
}

impl<T: Ord> MaxSink<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Arc::new(Mutex::new(BinaryHeap::with_capacity(capacity))),
        }
    }

    pub fn push(&self, item: T) {
        lock(&self.heap).push(item);
    }

    pub fn pop_max(&self) -> Option<T> {
        lock(&self.heap).pop()
    }

    pub fn len(&self) -> usize {
        lock(&self.heap).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_item_reaches_the_sink() {
        let sink = AppendSink::with_capacity(1000);
        let output = sink.clone();
        for_each_parallel((0..1000u32).collect(), move |i| output.push(i * 2)).await;

        let mut collected = sink.take();
        collected.sort_unstable();
        assert_eq!(collected, (0..1000u32).map(|i| i * 2).collect::<Vec<_>>());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn no_items_means_no_work() {
        let sink: AppendSink<u8> = AppendSink::with_capacity(0);
        let output = sink.clone();
        for_each_parallel(Vec::<u8>::new(), move |i| output.push(i)).await;
        assert!(sink.take().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn max_sink_yields_the_greatest_item() {
        let sink = MaxSink::with_capacity(64);
        let output = sink.clone();
        let values: Vec<i64> = (0..64).map(|i| (i * 37) % 64 - 20).collect();
        for_each_parallel(values, move |v| output.push(v)).await;

        assert_eq!(sink.len(), 64);
        assert_eq!(sink.pop_max(), Some(43));
        assert_eq!(sink.pop_max(), Some(42));
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn worker_panic_is_propagated() {
        for_each_parallel(vec![1, 2, 3], |i| {
            if i == 2 {
                panic!("boom");
            }
        })
        .await;
    }
}
