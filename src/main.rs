//! SWEEPER — single-account balance sweep agent
//!
//! Entry point. Loads configuration and credentials, initialises structured
//! logging, connects the notifier, and runs the poll → sweep loop until a
//! shutdown signal arrives. Credential or configuration problems abort
//! startup with a non-zero exit code before the loop begins.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sweeper::alerts::discord::DiscordTransport;
use sweeper::alerts::{LogNotifier, Notifier};
use sweeper::chain::keys::Account;
use sweeper::chain::rpc::SuiRpcClient;
use sweeper::config::{AppConfig, Credentials};
use sweeper::engine::fee::FeePolicy;
use sweeper::engine::submitter::Submitter;
use sweeper::engine::sweeper::{LoopTiming, Sweeper};
use sweeper::types::SuiAddress;

const BANNER: &str = r#"
 ____
/ ___|_      _____  ___ _ __   ___ _ __
\___ \ \ /\ / / _ \/ _ \ '_ \ / _ \ '__|
 ___) \ V  V /  __/  __/ |_) |  __/ |
|____/ \_/\_/ \___|\___| .__/ \___|_|
                       |_|
  Single-account balance sweep agent
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();
    println!("{BANNER}");

    // -- Configuration and credentials -----------------------------------

    let cfg = AppConfig::from_env().context("Failed to load configuration")?;
    let creds = Credentials::from_env()?;
    let account = Account::from_secret(&creds.signing_key)
        .context("Failed to load signing key")?;
    let destination = cfg.destination()?;

    if destination == account.address() {
        bail!("Destination {destination} is the swept account itself");
    }

    info!(
        agent_name = %cfg.agent.name,
        address = %account.address(),
        destination = %destination,
        rpc = %cfg.rpc.endpoint,
        fee_mode = ?cfg.fees.mode,
        reserve = cfg.fees.reserve,
        gas_budget = cfg.fees.gas_budget,
        "SWEEPER starting up"
    );

    // -- Initialise components -------------------------------------------

    let rpc = Arc::new(SuiRpcClient::new(
        &cfg.rpc.endpoint,
        Duration::from_secs(cfg.rpc.timeout_secs),
        cfg.rpc.max_coin_pages,
    )?);

    let notifier = build_notifier(&cfg, creds.notify_token, account.address()).await?;

    let submitter = Submitter::new(rpc.clone(), account);
    let sweeper = Sweeper::new(
        rpc,
        FeePolicy::new(cfg.fee_config(), destination),
        submitter,
        notifier,
        LoopTiming {
            poll_interval: cfg.poll_interval(),
            cooldown: cfg.cooldown(),
        },
    )
    .with_explorer_url(cfg.agent.explorer_url.clone());

    // -- Main loop -------------------------------------------------------

    info!("Entering sweep loop. Press Ctrl+C to stop.");
    sweeper.run(shutdown_signal()).await;

    info!("SWEEPER shut down cleanly.");
    Ok(())
}

/// Connect the Discord notifier, or fall back to log-only alerts.
///
/// A channel that rejects the bot token is a configuration error. A channel
/// that is merely unreachable within the connect timeout does not stop the
/// sweep; alerts go to the log instead.
async fn build_notifier(
    cfg: &AppConfig,
    token: Option<SecretString>,
    address: SuiAddress,
) -> Result<Arc<dyn Notifier>> {
    let (Some(channel_id), Some(token)) = (cfg.notify.channel_id.as_deref(), token) else {
        warn!("No notifier channel/token configured — alerts go to the log only");
        return Ok(Arc::new(LogNotifier));
    };

    let transport = DiscordTransport::new(
        token,
        channel_id,
        Duration::from_secs(cfg.notify.request_timeout_secs),
    )?;

    match transport
        .connect(Duration::from_secs(cfg.notify.connect_timeout_secs))
        .await
    {
        Ok(discord) => {
            discord
                .notify(&format!("✅ Sweeper online for `{}`", address.short()))
                .await;
            info!(channel = discord.channel_name(), "Notifier ready");
            Ok(Arc::new(discord))
        }
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "Discord unreachable — alerts go to the log only");
            Ok(Arc::new(LogNotifier))
        }
        Err(e) => Err(e).context("Discord notifier rejected"),
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sweeper=info"));

    let json_logging = std::env::var("SWEEPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
