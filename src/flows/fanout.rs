//! Bounded-parallelism fan-out for per-lesson work within a unit flow
//! (`spec.md` §4.3: lesson generation runs up to `lesson_parallelism` wide).

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `f` over every item with at most `parallelism` concurrent calls,
/// returning results in the original input order.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, parallelism: usize, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let f = Arc::new(f);
    let mut set = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let f = f.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            (idx, f(idx, item).await)
        });
    }

    let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        if let Ok((idx, result)) = joined {
            results[idx] = Some(result);
        }
    }
    results.into_iter().map(|r| r.expect("every spawned index reports back")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    #[tokio::test]
    async fn preserves_input_order_under_concurrency() {
        let items: Vec<u32> = (0..10).collect();
        let results = fan_out(items, 3, |_idx, n| async move { n * 2 }).await;
        assert_eq!(results, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_configured_parallelism() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..20).collect();
        let in_flight_for_closure = in_flight.clone();
        let max_seen_for_closure = max_seen.clone();
        fan_out(items, 4, move |_idx, _n| {
            let in_flight = in_flight_for_closure.clone();
            let max_seen = max_seen_for_closure.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }

    fn block_on<F: std::future::Future<Output = ()>>(fut: F) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(fut);
    }

    proptest! {
        #[test]
        fn prop_fan_out_preserves_input_order(
            items in prop::collection::vec(0u32..10_000, 0..40),
            parallelism in 1usize..8,
        ) {
            block_on(async move {
                let expected: Vec<u32> = items.iter().map(|n| n * 2).collect();
                let results = fan_out(items, parallelism, |_idx, n| async move { n * 2 }).await;
                assert_eq!(results, expected);
            });
        }
    }
}
