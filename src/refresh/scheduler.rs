use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a periodic refresh. Dropping it stops the timer.
#[must_use = "dropping a Subscription stops the refresh"]
pub struct Subscription {
    name: &'static str,
    token: CancellationToken,
}

impl Subscription {
    /// Stop the timer. Cycles already running finish but are not delivered.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            tracing::debug!(subscription = self.name, "Refresh unsubscribed");
        }
        self.token.cancel();
    }
}

/// Run `producer` right away and then every `interval`, handing each result to
/// `callback`.
///
/// Every tick starts an independent cycle; a slow cycle does not delay the next
/// one, so cycles may overlap. Ordering between overlapping results is left to
/// the consumer.
pub fn subscribe<T, P, Fut, C>(
    name: &'static str,
    interval: Duration,
    producer: P,
    callback: C,
) -> Subscription
where
    T: Send + 'static,
    P: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    C: Fn(T) + Send + Sync + 'static,
{
    let token = CancellationToken::new();
    let timer_token = token.clone();
    let callback = Arc::new(callback);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = timer_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let cycle = producer();
            let callback = Arc::clone(&callback);
            let cycle_token = timer_token.clone();

            tokio::spawn(async move {
                let value = cycle.await;
                if cycle_token.is_cancelled() {
                    tracing::debug!(subscription = name, "Dropping result after unsubscribe");
                    return;
                }
                callback(value);
            });
        }

        tracing::debug!(subscription = name, "Refresh timer stopped");
    });

    tracing::info!(subscription = name, interval_secs = interval.as_secs(), "Refresh scheduled");

    Subscription { name, token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(()) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move |()| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_then_every_interval() {
        let (count, callback) = counter();
        let subscription = subscribe(
            "test",
            Duration::from_millis(5000),
            || async {},
            callback,
        );

        sleep_ms(10).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep_ms(5000).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        sleep_ms(5000).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        subscription.unsubscribe();
        sleep_ms(20_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let (count, callback) = counter();
        let subscription = subscribe("test", Duration::from_secs(5), || async {}, callback);

        sleep_ms(10).await;
        drop(subscription);
        sleep_ms(30_000).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_result_not_delivered_after_unsubscribe() {
        let (count, callback) = counter();
        let subscription = subscribe(
            "test",
            Duration::from_secs(5),
            || tokio::time::sleep(Duration::from_secs(1)),
            callback,
        );

        sleep_ms(10).await;
        subscription.unsubscribe();
        sleep_ms(2000).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_overlap() {
        let started = Arc::new(AtomicUsize::new(0));
        let started_handle = Arc::clone(&started);
        let (finished, callback) = counter();

        let _subscription = subscribe(
            "test",
            Duration::from_secs(5),
            move || {
                started_handle.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(12))
            },
            callback,
        );

        sleep_ms(10_010).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        sleep_ms(2_000).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
