//! Email transport — outbound SMTP via lettre.
//!
//! Outbound-only: there is no inbound event stream for email, so
//! `fetch_updates` always reports an empty batch and invite confirmation
//! never arrives on this transport.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as LettreTransport};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::TransportError;
use crate::transport::{InboundEvent, Transport};

/// Subject used when the message text carries no `Subject:` line.
const DEFAULT_SUBJECT: &str = "notigate";

/// SMTP transport. Recipients are email addresses.
pub struct SmtpEmailTransport {
    config: SmtpConfig,
}

impl SmtpEmailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the blocking lettre transport. lettre's SmtpTransport is
    /// synchronous; callers run it inside `spawn_blocking`.
    fn smtp(&self) -> Result<SmtpTransport, TransportError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::relay(&self.config.host)
            .map_err(|e| TransportError::Smtp(format!("relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build())
    }

    fn build_message(&self, to: &str, text: &str) -> Result<Message, TransportError> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let (subject, body) = extract_subject(text);

        Message::builder()
            .from(from.parse().map_err(|e| {
                TransportError::Smtp(format!("invalid from address: {e}"))
            })?)
            .to(to.parse().map_err(|e| {
                TransportError::Smtp(format!("invalid to address: {e}"))
            })?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| TransportError::Smtp(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl Transport for SmtpEmailTransport {
    async fn send_one(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let transport = self.smtp()?;
        let email = self.build_message(recipient, text)?;

        let recipient = recipient.to_string();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| TransportError::Smtp(format!("send task failed: {e}")))?
            .map_err(|e| TransportError::Smtp(format!("send to {recipient} failed: {e}")))?;

        Ok(())
    }

    async fn check_connectivity(&self) -> Result<(), TransportError> {
        let transport = self.smtp()?;
        let ok = tokio::task::spawn_blocking(move || transport.test_connection())
            .await
            .map_err(|e| TransportError::Smtp(format!("connectivity task failed: {e}")))?
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        if ok {
            Ok(())
        } else {
            Err(TransportError::Smtp("SMTP connection test failed".into()))
        }
    }

    async fn fetch_updates(
        &self,
        _cursor: u64,
        _wait_secs: u64,
    ) -> Result<Vec<InboundEvent>, TransportError> {
        // Outbound-only transport: nothing ever arrives.
        Ok(Vec::new())
    }
}

/// Extract subject from outgoing text.
///
/// If the text starts with `Subject: ...`, that line becomes the subject and
/// the rest the body. Otherwise a default subject is used.
pub fn extract_subject(text: &str) -> (String, &str) {
    if let Some(rest) = text.strip_prefix("Subject: ")
        && let Some(pos) = rest.find('\n')
    {
        let subject = rest[..pos].trim().to_string();
        let body = rest[pos + 1..].trim_start();
        return (subject, body);
    }
    (DEFAULT_SUBJECT.to_string(), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.test.com".into(),
            port: 587,
            username: "user".into(),
            password: SecretString::from("pass"),
            from_name: "Notigate".into(),
            from_address: "user@test.com".into(),
        }
    }

    #[test]
    fn extract_subject_present() {
        let (subject, body) = extract_subject("Subject: Hello World\nThis is the body");
        assert_eq!(subject, "Hello World");
        assert_eq!(body, "This is the body");
    }

    #[test]
    fn extract_subject_missing() {
        let (subject, body) = extract_subject("Just a plain message");
        assert_eq!(subject, DEFAULT_SUBJECT);
        assert_eq!(body, "Just a plain message");
    }

    #[test]
    fn extract_subject_no_newline() {
        let (subject, body) = extract_subject("Subject: Only subject");
        assert_eq!(subject, DEFAULT_SUBJECT);
        assert_eq!(body, "Subject: Only subject");
    }

    #[test]
    fn build_message_rejects_bad_recipient() {
        let t = SmtpEmailTransport::new(config());
        assert!(t.build_message("not-an-address", "hi").is_err());
    }

    #[test]
    fn build_message_accepts_valid_recipient() {
        let t = SmtpEmailTransport::new(config());
        assert!(t.build_message("dest@example.com", "hi").is_ok());
    }

    #[tokio::test]
    async fn fetch_updates_always_empty() {
        let t = SmtpEmailTransport::new(config());
        let events = t.fetch_updates(0, 30).await.unwrap();
        assert!(events.is_empty());
    }
}
