//! Confirmation poller — long-polls the transport for inbound events and
//! resolves `/start <code>` confirmations against the invite registry.
//!
//! Known weakness, by contract: the cursor advances past each event before
//! its side effects run, so a crash mid-batch loses the remaining events of
//! that in-flight batch. Events behind the cursor are never reattempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::invite::{Binding, InviteRegistry};
use crate::transport::{InboundEvent, Transport};

/// Textual prefix of a confirmation command: `/start <invite code>`.
const CONFIRM_PREFIX: &str = "/start ";

/// Bounded wait passed to `fetch_updates`, in seconds.
const FETCH_WAIT_SECS: u64 = 30;

/// Fixed backoff after a transport failure.
const FETCH_BACKOFF: Duration = Duration::from_secs(2);

/// Spawn the long-lived confirmation poll loop.
///
/// `on_bound` runs synchronously inside the loop for every confirmed
/// binding: a slow callback delays subsequent polling. This is a documented
/// contract of the poller, not an oversight.
///
/// Returns a `JoinHandle` and a shutdown flag. The flag is sampled at the
/// top of each iteration only; an in-flight fetch is not interrupted, so
/// worst-case shutdown latency is one bounded wait plus the processing of
/// the batch already returned.
pub fn spawn_confirm_poller<T, F>(
    transport: Arc<T>,
    registry: Arc<InviteRegistry>,
    on_bound: F,
) -> (JoinHandle<()>, Arc<AtomicBool>)
where
    T: Transport + 'static,
    F: FnMut(Binding) + Send + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        run_poll_loop(transport, registry, on_bound, shutdown).await;
    });

    (handle, shutdown_flag)
}

/// The poll loop body. Runs until the shutdown flag is set.
async fn run_poll_loop<T, F>(
    transport: Arc<T>,
    registry: Arc<InviteRegistry>,
    mut on_bound: F,
    shutdown: Arc<AtomicBool>,
) where
    T: Transport + 'static,
    F: FnMut(Binding) + Send + 'static,
{
    info!("Confirmation poller started");
    let mut cursor: u64 = 0;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Confirmation poller stopped");
            return;
        }

        let events = match transport.fetch_updates(cursor, FETCH_WAIT_SECS).await {
            Ok(events) => events,
            Err(e) => {
                // Cursor untouched: nothing is lost, nothing falsely recorded.
                warn!("Poll fetch failed: {e}");
                tokio::time::sleep(FETCH_BACKOFF).await;
                continue;
            }
        };

        process_batch(&events, &mut cursor, &registry, &mut on_bound);
    }
}

/// Apply one fetched batch: advance the cursor past each event, then
/// evaluate its side effects. Events at or behind the cursor are ignored,
/// which also settles the duplicate-id case: a redelivered id is a no-op.
fn process_batch<F>(
    events: &[InboundEvent],
    cursor: &mut u64,
    registry: &InviteRegistry,
    on_bound: &mut F,
) where
    F: FnMut(Binding),
{
    let mut ordered: Vec<&InboundEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.event_id);

    for event in ordered {
        if event.event_id < *cursor {
            debug!(event_id = event.event_id, "Ignoring already-consumed event");
            continue;
        }
        // Consume before side effects: this event cannot be redelivered
        // within this process even if handling fails below.
        *cursor = event.event_id + 1;

        let Some(code) = event.text.strip_prefix(CONFIRM_PREFIX) else {
            continue;
        };
        let code = code.trim();
        if code.is_empty() {
            continue;
        }

        match registry.resolve_binding(code, event.conversation_id) {
            Ok(binding) => {
                info!(
                    user_id = %binding.user_id,
                    conversation_id = binding.conversation_id,
                    "Invite confirmed"
                );
                on_bound(binding);
            }
            Err(e) => {
                // Unknown or expired code; the confirming user simply gets
                // no binding.
                warn!(conversation_id = event.conversation_id, "{e}");
            }
        }
    }
}
