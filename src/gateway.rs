//! Caller-facing facade wiring the invite registry, confirmation poller and
//! broadcast dispatcher around one transport.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dispatch;
use crate::error::TransportError;
use crate::invite::{spawn_expiry_sweep, Binding, InviteRegistry};
use crate::poller::spawn_confirm_poller;
use crate::transport::{SendResult, Transport};

/// Default invite time-to-live.
pub const DEFAULT_INVITE_TTL: Duration = Duration::from_secs(600);

/// Default broadcast rate, sends per second.
pub const DEFAULT_SENDS_PER_SECOND: u32 = 30;

/// Messaging gateway over one transport.
///
/// Owns the invite registry and its expiry sweeper; pending invites and the
/// poll cursor live in process memory only, so a restart drops them.
pub struct Gateway<T: Transport + 'static> {
    transport: Arc<T>,
    registry: Arc<InviteRegistry>,
    sends_per_second: u32,
    sweeper: (JoinHandle<()>, Arc<AtomicBool>),
}

impl<T: Transport + 'static> Gateway<T> {
    pub fn new(transport: Arc<T>, invite_ttl: Duration, sends_per_second: u32) -> Self {
        let registry = InviteRegistry::new(invite_ttl);
        let sweeper = spawn_expiry_sweep(Arc::clone(&registry));
        Self {
            transport,
            registry,
            sends_per_second,
            sweeper,
        }
    }

    pub fn with_defaults(transport: Arc<T>) -> Self {
        Self::new(transport, DEFAULT_INVITE_TTL, DEFAULT_SENDS_PER_SECOND)
    }

    /// Issue a one-time invite code for `user_id`, valid for the configured
    /// TTL. Deep-link formatting is the transport's concern (e.g.
    /// [`TelegramTransport::invite_link`](crate::transport::TelegramTransport::invite_link)).
    pub fn create_invite(&self, user_id: &str) -> String {
        self.registry.create_invite(user_id)
    }

    /// Start the confirmation poll loop; `on_bound` fires synchronously for
    /// every confirmed binding. Returns the task handle and a shutdown flag.
    pub fn start_polling<F>(&self, on_bound: F) -> (JoinHandle<()>, Arc<AtomicBool>)
    where
        F: FnMut(Binding) + Send + 'static,
    {
        spawn_confirm_poller(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            on_bound,
        )
    }

    /// Broadcast `text` to every recipient under the configured rate limit.
    pub async fn send_messaging(&self, recipients: &[String], text: &str) -> Vec<SendResult> {
        dispatch::send_messaging(
            Arc::clone(&self.transport),
            recipients,
            text,
            self.sends_per_second,
        )
        .await
    }

    /// Passthrough connectivity check against the transport.
    pub async fn check_connection(&self) -> Result<(), TransportError> {
        self.transport.check_connectivity().await
    }

    pub fn registry(&self) -> &Arc<InviteRegistry> {
        &self.registry
    }
}

impl<T: Transport + 'static> Drop for Gateway<T> {
    fn drop(&mut self) {
        self.sweeper
            .1
            .store(true, std::sync::atomic::Ordering::Relaxed);
        self.sweeper.0.abort();
    }
}
