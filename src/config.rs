//! Environment-based configuration.
//!
//! Every variable carries the `NOTIGATE_` prefix. A channel whose required
//! variables are missing is simply disabled; this is never a startup failure.

use secrecy::SecretString;

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("NOTIGATE_{name}"))
        .ok()
        .filter(|s| !s.is_empty())
}

/// Telegram Bot API configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: SecretString,
    /// Bot username, used to build `t.me` invite links.
    pub bot_name: String,
}

impl TelegramConfig {
    /// Build config from environment variables.
    /// Returns `None` if `NOTIGATE_TELEGRAM_TOKEN` or
    /// `NOTIGATE_TELEGRAM_BOT_NAME` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let token = env_var("TELEGRAM_TOKEN")?;
        let bot_name = env_var("TELEGRAM_BOT_NAME")?;

        Some(Self {
            token: SecretString::from(token),
            bot_name,
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("bot_name", &self.bot_name)
            .finish()
    }
}

/// SMTP configuration for the email transport.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Display name for the `From:` header.
    pub from_name: String,
    /// Sender address. Defaults to the username.
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `None` unless host, username and password are all set.
    pub fn from_env() -> Option<Self> {
        let host = env_var("SMTP_HOST")?;
        let username = env_var("SMTP_USER")?;
        let password = env_var("SMTP_PASSWORD")?;

        let port: u16 = env_var("SMTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let from_name = env_var("SMTP_FROM_NAME").unwrap_or_else(|| "notigate".to_string());
        let from_address = env_var("SMTP_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        Some(Self {
            host,
            port,
            username,
            password: SecretString::from(password),
            from_name,
            from_address,
        })
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .field("from_address", &self.from_address)
            .finish()
    }
}
