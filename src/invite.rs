//! Invite registry — one-time codes binding an internal user id to an
//! external conversation once confirmed.
//!
//! A pending binding lives from creation until resolution or expiry,
//! whichever wins the race. Expiry is enforced two ways with one observable
//! behavior: a lazy deadline check inside `resolve_binding`, and a single
//! background sweeper draining a min-heap of deadlines (rather than one timer
//! task per invite).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::InviteError;

/// Confirmed pairing of an internal user id with an external conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub user_id: String,
    pub conversation_id: i64,
}

/// Unconfirmed invite state, subject to expiry.
#[derive(Debug, Clone)]
struct PendingBinding {
    user_id: String,
    expires_at: Instant,
}

#[derive(Default)]
struct RegistryInner {
    pending: HashMap<String, PendingBinding>,
    // Deadlines for the sweeper; stale entries (already resolved) are
    // skipped when popped.
    deadlines: BinaryHeap<Reverse<(Instant, String)>>,
}

/// Concurrent-safe store of pending invites.
///
/// All methods take `&self`; the registry is shared via `Arc` between invite
/// creators, the confirmation poller and the expiry sweeper.
pub struct InviteRegistry {
    inner: Mutex<RegistryInner>,
    ttl: Duration,
}

impl InviteRegistry {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner::default()),
            ttl,
        })
    }

    /// Generate a unique single-use code and store a pending binding that
    /// expires `ttl` from now. The deep link is built by the caller from the
    /// returned code.
    pub fn create_invite(&self, user_id: &str) -> String {
        let code = Uuid::new_v4().to_string();
        let expires_at = Instant::now() + self.ttl;

        let mut inner = self.inner.lock().unwrap();
        inner.pending.insert(
            code.clone(),
            PendingBinding {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        inner.deadlines.push(Reverse((expires_at, code.clone())));
        debug!(user_id, "Created invite");
        code
    }

    /// Atomically consume `code` and bind its user to `conversation_id`.
    ///
    /// Exactly one of any number of concurrent callers observes success; the
    /// rest (and any caller after expiry) get [`InviteError::NotFound`].
    pub fn resolve_binding(
        &self,
        code: &str,
        conversation_id: i64,
    ) -> Result<Binding, InviteError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pending) = inner.pending.remove(code) else {
            return Err(InviteError::NotFound { code: code.into() });
        };

        // Lazy expiry: the sweeper may not have run yet. The entry is
        // already removed, so this stays a consume-once path.
        if pending.expires_at <= Instant::now() {
            return Err(InviteError::NotFound { code: code.into() });
        }

        Ok(Binding {
            user_id: pending.user_id,
            conversation_id,
        })
    }

    /// Remove every pending invite whose deadline has passed. Idempotent;
    /// entries already resolved are skipped. Returns the number evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        let mut evicted = 0;

        while let Some(Reverse((deadline, _))) = inner.deadlines.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, code))) = inner.deadlines.pop() else {
                break;
            };
            // Only evict if still pending and actually expired; a code can
            // have been resolved (entry gone) in the meantime.
            let expired = inner
                .pending
                .get(&code)
                .is_some_and(|p| p.expires_at <= now);
            if expired {
                inner.pending.remove(&code);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(evicted, "Swept expired invites");
        }
        evicted
    }

    /// Next deadline the sweeper should wake at, if any invite is pending.
    fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.lock().unwrap();
        inner.deadlines.peek().map(|Reverse((d, _))| *d)
    }

    /// Number of currently pending invites.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}

/// Spawn the background sweeper that evicts expired invites.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop sweeping.
pub fn spawn_expiry_sweep(registry: Arc<InviteRegistry>) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Invite expiry sweeper started");
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Invite expiry sweeper shutting down");
                return;
            }

            // Sleep until the earliest deadline; with nothing pending, wake
            // at TTL granularity to notice new invites.
            let wake_at = registry
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + registry.ttl);
            tokio::time::sleep_until(wake_at).await;

            registry.sweep_expired();
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(600);

    #[test]
    fn resolve_succeeds_once_then_not_found() {
        let registry = InviteRegistry::new(TTL);
        let code = registry.create_invite("u1");

        let binding = registry.resolve_binding(&code, 555).unwrap();
        assert_eq!(
            binding,
            Binding {
                user_id: "u1".into(),
                conversation_id: 555
            }
        );

        let second = registry.resolve_binding(&code, 555);
        assert!(matches!(second, Err(InviteError::NotFound { .. })));
    }

    #[test]
    fn resolve_unknown_code_not_found() {
        let registry = InviteRegistry::new(TTL);
        assert!(registry.resolve_binding("never-created", 1).is_err());
    }

    #[test]
    fn concurrent_resolution_exactly_one_winner() {
        let registry = InviteRegistry::new(TTL);
        let code = registry.create_invite("u1");
        let successes = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let code = code.clone();
                let successes = Arc::clone(&successes);
                std::thread::spawn(move || {
                    if registry.resolve_binding(&code, 42).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ten_thousand_codes_never_collide() {
        let registry = InviteRegistry::new(TTL);
        let mut codes = HashSet::new();
        for _ in 0..10_000 {
            assert!(codes.insert(registry.create_invite("u")));
        }
        assert_eq!(registry.pending_count(), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_after_ttl_not_found_even_without_sweep() {
        let registry = InviteRegistry::new(TTL);
        let code = registry.create_invite("u1");

        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        // No sweeper running; lazy check must reject it.
        assert!(registry.resolve_binding(&code, 1).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_expired() {
        let registry = InviteRegistry::new(TTL);
        let _old = registry.create_invite("u1");

        tokio::time::advance(TTL / 2).await;
        let fresh = registry.create_invite("u2");

        tokio::time::advance(TTL / 2 + Duration::from_secs(1)).await;
        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.pending_count(), 1);

        // The fresh invite is still resolvable.
        assert!(registry.resolve_binding(&fresh, 2).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_skips_resolved_entries() {
        let registry = InviteRegistry::new(TTL);
        let code = registry.create_invite("u1");
        registry.resolve_binding(&code, 1).unwrap();

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        // Deadline entry is stale; nothing to evict.
        assert_eq!(registry.sweep_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_evicts_after_ttl() {
        let registry = InviteRegistry::new(Duration::from_secs(10));
        let _code = registry.create_invite("u1");

        let (handle, shutdown) = spawn_expiry_sweep(Arc::clone(&registry));

        tokio::time::advance(Duration::from_secs(11)).await;
        // Let the sweeper task observe its wakeup.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.pending_count(), 0);

        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
    }
}
