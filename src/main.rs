use std::sync::Arc;

use notigate::config::TelegramConfig;
use notigate::gateway::Gateway;
use notigate::transport::TelegramTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("notigate v{}", env!("CARGO_PKG_VERSION"));

    let Some(telegram_config) = TelegramConfig::from_env() else {
        eprintln!("Error: NOTIGATE_TELEGRAM_TOKEN / NOTIGATE_TELEGRAM_BOT_NAME not set");
        std::process::exit(1);
    };

    let transport = Arc::new(TelegramTransport::new(telegram_config));
    let gateway = Gateway::with_defaults(Arc::clone(&transport));

    if let Err(e) = gateway.check_connection().await {
        tracing::warn!("Telegram unreachable, check the bot token: {e}");
    }

    // Demo invite: follow the printed link and press Start in Telegram.
    let code = gateway.create_invite("demo-user");
    eprintln!("   Invite link: {}", transport.invite_link(&code));

    let (poller, shutdown) = gateway.start_polling(|binding| {
        tracing::info!(
            user_id = %binding.user_id,
            conversation_id = binding.conversation_id,
            "Bound"
        );
    });

    tokio::signal::ctrl_c().await?;
    eprintln!("Shutting down...");
    shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    poller.abort();

    Ok(())
}
