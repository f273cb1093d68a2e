use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use visawatch::config::{AppConfig, DEFAULT_STATUS_FILE};
use visawatch::manager::{CheckOutcome, NotificationManager};
use visawatch::notify::bark::BarkChannel;
use visawatch::notify::console::ConsoleChannel;
use visawatch::notify::email::EmailChannel;
use visawatch::notify::telegram::TelegramChannel;
use visawatch::notify::Dispatcher;
use visawatch::source::captcha::{ManualCaptchaSolver, RemoteCaptchaSolver};
use visawatch::source::ceac::CeacStatusSource;
use visawatch::source::CaptchaSolver;
use visawatch::store::StatusStore;

#[derive(Parser)]
#[command(
    name = "visawatch",
    about = "Visa-application status watcher with change detection and multi-channel notifications",
    version,
    long_about = None
)]
struct Cli {
    /// Send a test notification to verify channels are working
    #[arg(long)]
    test: bool,

    /// Manually input the captcha instead of using the solver service
    #[arg(long)]
    manual_captcha: bool,

    /// Path of the persisted status history
    #[arg(long, default_value = DEFAULT_STATUS_FILE)]
    status_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Local .env overrides nothing, it only fills gaps in the environment.
    if dotenvy::dotenv().is_ok() {
        info!("Loaded configuration from .env");
    }

    let cli = Cli::parse();

    // The only fatal paths: missing identity, inverted active-hours window.
    let config = AppConfig::from_env()?;

    let solver: Box<dyn CaptchaSolver> = if cli.manual_captcha {
        info!("Using manual captcha input mode");
        Box::new(ManualCaptchaSolver)
    } else if let Some(url) = config.captcha_solver_url.as_deref() {
        Box::new(RemoteCaptchaSolver::new(url))
    } else {
        warn!("CAPTCHA_SOLVER_URL not set, falling back to manual captcha input");
        Box::new(ManualCaptchaSolver)
    };

    let dispatcher = build_dispatcher(&config);

    let manager = NotificationManager::new(
        config,
        StatusStore::new(&cli.status_file),
        Box::new(CeacStatusSource::default()),
        solver,
        dispatcher,
    );

    if cli.test {
        info!("Sending test notification");
        let outcomes = manager.test_dispatch().await;
        for o in &outcomes {
            match &o.result {
                Ok(()) => println!("{}: ok", o.channel),
                Err(e) => println!("{}: failed ({e})", o.channel),
            }
        }
        return Ok(());
    }

    match manager.run_check().await {
        CheckOutcome::QueryFailed { error } => {
            println!("Failed to query status: {error}");
        }
        CheckOutcome::Unchanged { status } => {
            println!("Status unchanged ({status}). No notification sent.");
        }
        CheckOutcome::Suppressed { status } => {
            println!("Status changed to {status}; outside active hours, no notification sent.");
        }
        CheckOutcome::Notified { status, outcomes } => {
            let sent = outcomes.iter().filter(|o| o.is_ok()).count();
            println!(
                "Status changed to {status}; notified {sent}/{} channel(s).",
                outcomes.len()
            );
        }
    }

    Ok(())
}

/// Register every channel whose credential set is complete; fall back to the
/// console channel when nothing is configured.
fn build_dispatcher(config: &AppConfig) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    if let Some(email) = &config.channels.email {
        match EmailChannel::new(&email.from, &email.to, &email.password, &email.smtp_host) {
            Ok(channel) => dispatcher.register(Box::new(channel)),
            Err(e) => warn!(error = %e, "Email channel misconfigured, skipping"),
        }
    }
    if let Some(tg) = &config.channels.telegram {
        dispatcher.register(Box::new(TelegramChannel::new(&tg.bot_token, &tg.chat_id)));
    }
    if let Some(bark) = &config.channels.bark {
        dispatcher.register(Box::new(BarkChannel::new(&bark.device_key, &bark.server_url)));
    }

    if dispatcher.is_empty() {
        warn!("No notification channels configured, printing to the console instead");
        dispatcher.register(Box::new(ConsoleChannel));
    } else {
        info!(channels = ?dispatcher.channel_names(), "Enabled notification channels");
    }
    dispatcher
}
