//! Player binary for the Kickline soccer agent.
//!
//! Runs exactly one player: loads `kickline.yaml` (defaults if absent),
//! builds the turn lookup table and rule policy, joins the server, and plays
//! until the session faults or the process receives Ctrl-C.
//!
//! ```text
//! config --> TurnLookupTable --> RulePolicy --> SessionController(UdpLink)
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use kickline_core::config::AgentConfig;
use kickline_core::policy::rules::RulePolicy;
use kickline_core::session::{SessionController, SessionSettings};
use kickline_core::turn_table::TurnLookupTable;
use kickline_net::UdpLink;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "kickline.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the handshake fails, or
/// the session faults while playing.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("kickline-agent starting");

    let config = load_config().context("loading configuration")?;
    info!(
        host = config.server.host,
        port = config.server.port,
        team = config.team.name,
        version = config.server.version,
        "configuration loaded"
    );

    let table = TurnLookupTable::build(config.lookup.curve, config.lookup.buckets)
        .context("building turn lookup table")?;
    info!(
        buckets = table.len(),
        curve = ?table.curve(),
        "turn lookup table built"
    );

    let policy = RulePolicy::new(
        Arc::new(table),
        config.lookup.enemy_table,
        config.policy.clone(),
    );
    let mut session = SessionController::new(
        Arc::new(UdpLink),
        Arc::new(policy),
        SessionSettings::from_config(&config),
    );

    session
        .connect(
            &config.server.host,
            config.server.port,
            &config.team.name,
            config.server.version,
        )
        .await
        .context("joining the server")?;
    if let Some(identity) = session.identity() {
        info!(
            session = %session.id(),
            side = ?identity.side,
            uniform = identity.uniform_number,
            "joined"
        );
    }

    session.play().context("starting the decision loop")?;

    let outcome = tokio::select! {
        fault = session.wait_for_fault() => {
            error!(%fault, "session faulted");
            Err(anyhow::Error::new(fault).context("session ended abnormally"))
        }
        signal = tokio::signal::ctrl_c() => {
            info!("interrupt received, leaving the match");
            signal.context("listening for Ctrl-C")
        }
    };

    session.disconnect().await;
    info!("kickline-agent shutdown complete");
    outcome
}

/// Load `kickline.yaml` if present, otherwise defaults. Environment
/// overrides apply either way.
fn load_config() -> anyhow::Result<AgentConfig> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        return Ok(AgentConfig::from_file(path)?);
    }

    info!("config file not found, using defaults");
    let mut config = AgentConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
