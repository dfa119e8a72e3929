use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    clap::Parser,
    secrecy::Secret,
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    courier_core::{RelayService, ServiceOptions},
    courier_telegram::{BotContext, RelayConfig, RelayTransport, bot},
};

/// Delay before the supervisor restarts a crashed service run.
const RESTART_DELAY: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "courier", about = "Courier — Telegram relay bot")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Number of concurrent delivery workers.
    #[arg(long, env = "COURIER_WORKERS", default_value_t = 3)]
    workers: usize,

    /// Role-store snapshot file.
    #[arg(long, env = "COURIER_SNAPSHOT", default_value = "courier_state.json")]
    snapshot: PathBuf,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Read the required credentials from the environment. All five must be
/// present; a partial set is a deployment mistake, not something to limp
/// through.
fn load_config(cli: &Cli) -> anyhow::Result<RelayConfig> {
    let mut missing = Vec::new();
    let mut required = |name: &'static str| -> Secret<String> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Secret::new(value),
            _ => {
                missing.push(name);
                Secret::new(String::new())
            },
        }
    };

    let api_id = required("TELEGRAM_API_ID");
    let api_hash = required("TELEGRAM_API_HASH");
    let bot_token = required("TELEGRAM_BOT_TOKEN");
    let admin_secret = required("ADMIN_PASSWORD");
    let owner_secret = required("OWNER_PASSWORD");

    if !missing.is_empty() {
        anyhow::bail!("missing required environment variables: {}", missing.join(", "));
    }

    Ok(RelayConfig {
        api_id,
        api_hash,
        bot_token,
        admin_secret,
        owner_secret,
        workers: cli.workers.max(1),
        snapshot_path: Some(cli.snapshot.clone()),
    })
}

/// One full service run: connect, serve until a termination signal, drain.
///
/// Returns `Ok` on a clean operator-initiated shutdown and `Err` when the
/// run ended on its own, in which case the supervisor restarts it.
async fn run_service(config: &RelayConfig) -> anyhow::Result<()> {
    let telegram = bot::connect(&config.bot_token).await?;
    let transport = Arc::new(RelayTransport::new(telegram.clone()));

    let options = ServiceOptions {
        workers: config.workers,
        snapshot_path: config.snapshot_path.clone(),
        ..Default::default()
    };
    let mut service = RelayService::new(transport, options);
    service.start().await;

    let ctx = Arc::new(BotContext {
        bot: telegram,
        state: service.state(),
        queue: service.queue(),
        secrets: config.secrets(),
        workers: config.workers,
    });

    let cancel = CancellationToken::new();
    let poller = bot::spawn_polling(ctx, cancel.clone());

    let clean = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("termination signal received");
            true
        },
        () = cancel.cancelled() => {
            // The polling loop gave up (e.g. a token conflict).
            false
        },
    };

    cancel.cancel();
    let _ = poller.await;
    service.shutdown().await?;

    if clean {
        Ok(())
    } else {
        anyhow::bail!("telegram polling stopped unexpectedly")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");
    let config = load_config(&cli)?;

    // Supervisor: restart crashed runs after a delay, exit on clean shutdown.
    loop {
        match run_service(&config).await {
            Ok(()) => break,
            Err(e) => {
                error!(error = %e, delay_secs = RESTART_DELAY.as_secs(), "service run failed, restarting");
                tokio::time::sleep(RESTART_DELAY).await;
            },
        }
    }

    info!("courier stopped");
    Ok(())
}
