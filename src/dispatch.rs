//! Broadcast dispatcher — fans one message out to many recipients under a
//! shared outbound rate limit, collecting an independent result for each.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::transport::{SendResult, Transport};

/// Token bucket with burst capacity of one: permits are handed out at a
/// fixed interval, each caller sleeping until its reserved slot.
pub struct RateLimiter {
    interval: Duration,
    next_slot: tokio::sync::Mutex<Instant>,
}

impl RateLimiter {
    /// Limiter granting `per_second` permits per second.
    pub fn new(per_second: u32) -> Self {
        assert!(per_second > 0, "rate must be positive");
        Self::every(Duration::from_secs(1) / per_second)
    }

    /// Limiter granting one permit per `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: tokio::sync::Mutex::new(Instant::now()),
        }
    }

    /// Wait for the next permit. The first caller passes immediately;
    /// each subsequent permit is one interval after the previous.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Send `text` to every recipient concurrently, bounded by a limiter of
/// `per_second` sends, and return one result per recipient.
///
/// The limiter is scoped to this call: overlapping broadcasts each get their
/// own budget and can together exceed the nominal aggregate rate. A failed
/// send is recorded for its recipient and never affects the others; the
/// call returns only once every recipient task has finished.
pub async fn send_messaging<T>(
    transport: Arc<T>,
    recipients: &[String],
    text: &str,
    per_second: u32,
) -> Vec<SendResult>
where
    T: Transport + 'static,
{
    let limiter = Arc::new(RateLimiter::new(per_second));

    let handles: Vec<_> = recipients
        .iter()
        .map(|recipient| {
            let transport = Arc::clone(&transport);
            let limiter = Arc::clone(&limiter);
            let recipient = recipient.clone();
            let text = text.to_string();

            tokio::spawn(async move {
                limiter.acquire().await;
                let error = transport.send_one(&recipient, &text).await.err();
                if let Some(ref e) = error {
                    error!(recipient = %recipient, "Broadcast send failed: {e}");
                }
                SendResult { recipient, error }
            })
        })
        .collect();

    // Join barrier: exactly one result per recipient, order-independent.
    let joined = futures::future::join_all(handles).await;
    let mut results = Vec::with_capacity(joined.len());
    for (outcome, recipient) in joined.into_iter().zip(recipients) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                error!(recipient = %recipient, "Broadcast task failed: {e}");
                results.push(SendResult {
                    recipient: recipient.clone(),
                    error: Some(crate::error::TransportError::Http(format!(
                        "send task failed: {e}"
                    ))),
                });
            }
        }
    }

    debug!(
        total = results.len(),
        failed = results.iter().filter(|r| !r.is_ok()).count(),
        "Broadcast finished"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::InboundEvent;
    use async_trait::async_trait;
    use rand::Rng;
    use std::collections::HashSet;

    /// Transport that records sends and fails for configured recipients.
    struct RecordingTransport {
        fail_for: HashSet<String>,
        jitter: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_one(&self, recipient: &str, _text: &str) -> Result<(), TransportError> {
            if self.jitter {
                let ms = rand::thread_rng().gen_range(0..20);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if self.fail_for.contains(recipient) {
                return Err(TransportError::Http(format!("injected failure for {recipient}")));
            }
            Ok(())
        }

        async fn check_connectivity(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn fetch_updates(
            &self,
            _cursor: u64,
            _wait_secs: u64,
        ) -> Result<Vec<InboundEvent>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chat-{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_spaces_permits_by_interval() {
        let limiter = RateLimiter::every(Duration::from_millis(100));
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await;
        }

        // First permit free, four more at 100ms apart.
        assert!(Instant::now() - start >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_burst_capacity_is_one() {
        let limiter = RateLimiter::every(Duration::from_secs(1));
        let start = Instant::now();

        // Even after a long idle period, only one permit is immediate.
        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(Instant::now() - start >= Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn hundred_recipients_one_result_each() {
        let transport = Arc::new(RecordingTransport {
            fail_for: HashSet::new(),
            jitter: false,
        });
        let recips = recipients(100);
        let start = Instant::now();

        let results = send_messaging(transport, &recips, "hello", 30).await;

        assert_eq!(results.len(), 100);
        let unique: HashSet<_> = results.iter().map(|r| r.recipient.clone()).collect();
        assert_eq!(unique.len(), 100);
        assert!(results.iter().all(SendResult::is_ok));

        // 100 sends at 30/s: 99 spaced permits after the first free one.
        assert!(Instant::now() - start >= 99 * (Duration::from_secs(1) / 30));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_isolated_to_their_recipients() {
        let fail_for: HashSet<String> =
            ["chat-3", "chat-7"].iter().map(|s| s.to_string()).collect();
        let transport = Arc::new(RecordingTransport {
            fail_for: fail_for.clone(),
            jitter: true,
        });
        let recips = recipients(10);

        let results = send_messaging(transport, &recips, "hello", 100).await;

        assert_eq!(results.len(), 10);
        for result in &results {
            assert_eq!(
                result.is_ok(),
                !fail_for.contains(&result.recipient),
                "unexpected outcome for {}",
                result.recipient
            );
        }
    }

    #[tokio::test]
    async fn empty_recipient_list_yields_no_results() {
        let transport = Arc::new(RecordingTransport {
            fail_for: HashSet::new(),
            jitter: false,
        });
        let results = send_messaging(transport, &[], "hello", 30).await;
        assert!(results.is_empty());
    }
}
