use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ibc_testing::{
    ChainAgent, ConnectionHandshake, HarnessConfig, InMemoryLedger, LedgerConfig,
};

#[derive(Parser)]
#[command(name = "handshake-demo")]
#[command(about = "Run the IBC connection handshake between two in-memory ledgers")]
#[command(version)]
pub struct Cli {
    /// Configuration file path; built-in defaults are used when it does not exist
    #[arg(short, long, default_value = "config/harness.toml")]
    pub config: String,

    /// Log level; overrides `global.log_level` from the configuration
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create clients on both chains, open a connection and cross-verify the clients
    Run {
        /// Block production interval of each ledger
        #[arg(long, default_value_t = 20)]
        block_interval_ms: u64,
    },
    /// Write the default configuration
    InitConfig {
        /// Output path
        #[arg(long, default_value = "config/harness.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_found = Path::new(&cli.config).exists();
    let loaded = if config_found {
        HarnessConfig::load(&cli.config)
    } else {
        Ok(HarnessConfig::default())
    };

    // Initialize logging
    let log_level = match &loaded {
        Ok(config) => config.effective_log_level(cli.log_level.as_deref()).to_string(),
        Err(_) => cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ibc_testing={0},handshake_demo={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run { block_interval_ms } => {
            let config = loaded?;
            if config_found {
                info!("Loaded configuration from: {}", cli.config);
            } else {
                warn!("{} not found, using default configuration", cli.config);
            }
            run_handshake(config, Duration::from_millis(block_interval_ms)).await?;
        }
        Commands::InitConfig { output } => {
            if let Some(parent) = Path::new(&output).parent() {
                std::fs::create_dir_all(parent)?;
            }
            HarnessConfig::default().save(&output)?;
            info!("Wrote default configuration to {}", output);
        }
    }

    Ok(())
}

async fn run_handshake(config: HarnessConfig, block_interval: Duration) -> anyhow::Result<()> {
    let [chain_a, chain_b] = match config.chains.as_slice() {
        [a, b, ..] => [a.clone(), b.clone()],
        _ => anyhow::bail!("two chains must be configured"),
    };

    let mut producers = Vec::new();
    let mut agents = Vec::new();
    for chain in [&chain_a, &chain_b] {
        let mut ledger_config = LedgerConfig::new(chain.chain_id);
        ledger_config.contracts = chain.contracts;
        ledger_config.prefix = config.handshake.commitment_prefix.as_str().into();
        ledger_config.supported_versions = config.handshake.versions.clone();

        let ledger = Arc::new(InMemoryLedger::new(ledger_config)?);
        producers.push(ledger.spawn_block_production(block_interval));
        agents.push(ChainAgent::from_config(ledger, &config)?);
    }
    let (mut a, mut b) = match (agents.pop(), agents.pop()) {
        (Some(b), Some(a)) => (a, b),
        _ => anyhow::bail!("failed to start both chains"),
    };

    a.update_header().await?;
    b.update_header().await?;

    let client_a = a.create_besu_client(&b).await?;
    let client_b = b.create_besu_client(&a).await?;

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);

    let mut handshake = ConnectionHandshake::new(conn_a.clone(), conn_b.clone());
    handshake.complete_handshake(&mut a, &mut b).await?;

    for (agent, connection) in [(&a, &conn_a), (&b, &conn_b)] {
        if let Some(end) = agent.backend().query_connection(&connection.id).await? {
            info!("Chain {} {}: {}", agent.chain_id(), connection.id, end.state);
        }
    }

    let a_verified = a.verify_client_state(&client_a, &mut b, &client_b).await?;
    let b_verified = b.verify_client_state(&client_b, &mut a, &client_a).await?;
    info!(
        "Client state verification: {} -> {}, {} -> {}",
        a.chain_id(),
        a_verified,
        b.chain_id(),
        b_verified
    );

    for producer in producers {
        producer.abort();
    }

    if !(a_verified && b_verified) {
        anyhow::bail!("client state verification failed");
    }
    Ok(())
}
