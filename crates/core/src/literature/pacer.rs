use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct FixedDelayPacer {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Sleeps until `delay` has passed since the previous turn, then records
    /// this one. The lock is held while sleeping so callers queue in order.
    pub async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_request_does_not_wait() {
        let pacer = FixedDelayPacer::new(Duration::from_secs(1));
        let start = Instant::now();
        pacer.wait_turn().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn successive_requests_are_spaced_by_the_delay() {
        let pacer = FixedDelayPacer::new(Duration::from_secs(1));
        let start = Instant::now();

        pacer.wait_turn().await;
        pacer.wait_turn().await;
        pacer.wait_turn().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2_100));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_the_delay() {
        let pacer = FixedDelayPacer::new(Duration::from_secs(1));
        pacer.wait_turn().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let before = Instant::now();
        pacer.wait_turn().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_instances_are_independent() {
        let first = Arc::new(FixedDelayPacer::new(Duration::from_secs(5)));
        let second = Arc::new(FixedDelayPacer::new(Duration::from_secs(5)));
        first.wait_turn().await;
        second.wait_turn().await;

        let start = Instant::now();
        let slow = tokio::spawn({
            let first = Arc::clone(&first);
            async move { first.wait_turn().await }
        });
        second.wait_turn().await;
        let second_done = start.elapsed();
        let _ = slow.await;

        assert!(second_done >= Duration::from_secs(5));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
    }
}
