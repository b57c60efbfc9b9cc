//! Requests-per-minute pacing for a single run.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Hands out evenly spaced start slots. Unlimited when built without a cap.
#[derive(Debug)]
pub(crate) struct RequestThrottle {
    interval: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub(crate) fn new(max_requests_per_minute: Option<u32>) -> Self {
        let interval = max_requests_per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs(60) / rpm);
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub(crate) async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
