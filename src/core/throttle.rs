use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Process-wide pacing for outbound provider calls.
///
/// Telegram enforces its rate limit per bot, not per job, so one `Throttle`
/// is shared by every broadcast worker (and any future outbound path).
/// Each caller reserves the next free send slot and sleeps until it opens;
/// slots are spaced `interval` apart, which bounds aggregate throughput to
/// `1 / interval` sends per second regardless of worker count.
#[derive(Clone)]
pub struct Throttle {
    /// Earliest instant at which the next send may start
    next_slot: Arc<Mutex<Instant>>,
    /// Minimum spacing between sends
    interval: Duration,
}

impl Throttle {
    /// Creates a throttle with the given minimum spacing between sends.
    pub fn new(interval: Duration) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(Instant::now())),
            interval,
        }
    }

    /// Waits for the caller's turn under the shared rate ceiling.
    ///
    /// Reserves the next slot while holding the lock, then sleeps outside
    /// the critical section so waiting callers queue up without serializing
    /// their actual sends behind one another's sleeps.
    pub async fn acquire(&self) {
        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let start = if *next > now { *next } else { now };
            *next = start + self.interval;
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// The configured spacing between sends.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_sequential_acquires_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(30));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        // Third acquire cannot start before two full intervals have passed
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_share_one_budget() {
        let throttle = Throttle::new(Duration::from_millis(25));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let t = throttle.clone();
            handles.push(tokio::spawn(async move {
                t.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 acquires over a shared 25 ms budget need at least 3 intervals
        assert!(start.elapsed() >= Duration::from_millis(75));
    }
}
