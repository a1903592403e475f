//! Transport abstraction for message delivery and inbound event retrieval.

pub mod email;
pub mod telegram;

use async_trait::async_trait;

pub use email::SmtpEmailTransport;
pub use telegram::TelegramTransport;

use crate::error::TransportError;

/// One inbound event as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Monotonically increasing per-stream sequence id.
    pub event_id: u64,
    /// Message text, empty for non-text events.
    pub text: String,
    /// Conversation the event originated from.
    pub conversation_id: i64,
}

/// Outcome of one broadcast send, keyed by recipient.
#[derive(Debug)]
pub struct SendResult {
    pub recipient: String,
    pub error: Option<TransportError>,
}

impl SendResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Capability for delivering messages and draining inbound events.
///
/// Implementations perform the actual network calls; the core treats this as
/// opaque. Outbound-only transports return empty batches from
/// [`fetch_updates`](Transport::fetch_updates).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a single message to one recipient.
    async fn send_one(&self, recipient: &str, text: &str) -> Result<(), TransportError>;

    /// Verify the platform is reachable and credentials are accepted.
    async fn check_connectivity(&self) -> Result<(), TransportError>;

    /// Fetch inbound events starting at `cursor`, waiting up to `wait_secs`
    /// for new data. Returns an empty vec on timeout with nothing new.
    async fn fetch_updates(
        &self,
        cursor: u64,
        wait_secs: u64,
    ) -> Result<Vec<InboundEvent>, TransportError>;
}
