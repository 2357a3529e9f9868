// Shared setup for integration tests: two in-memory ledgers and their agents

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use ibc_testing::{
    ChainAgent, HandshakeConfig, HarnessConfig, InMemoryLedger, LedgerConfig, SyncOptions,
};

pub const CHAIN_A: u64 = 2018;
pub const CHAIN_B: u64 = 3018;

pub struct TestChains {
    pub a: ChainAgent,
    pub b: ChainAgent,
    pub ledger_a: Arc<InMemoryLedger>,
    pub ledger_b: Arc<InMemoryLedger>,
    producers: Vec<JoinHandle<()>>,
}

impl Drop for TestChains {
    fn drop(&mut self) {
        for producer in &self.producers {
            producer.abort();
        }
    }
}

pub fn fast_sync() -> SyncOptions {
    SyncOptions {
        timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(5),
        tx_timeout: Duration::from_secs(5),
    }
}

/// Two chains with background block production every `block_interval`
pub fn setup_producing(block_interval: Duration) -> TestChains {
    setup_producing_with(block_interval, HandshakeConfig::default())
}

/// Producing chains whose agents use `handshake` instead of the default settings
pub fn setup_producing_with(block_interval: Duration, handshake: HandshakeConfig) -> TestChains {
    let mut chains = build(fast_sync(), handshake);
    chains.producers = vec![
        chains.ledger_a.spawn_block_production(block_interval),
        chains.ledger_b.spawn_block_production(block_interval),
    ];
    chains
}

/// Two chains that only produce blocks on transactions or `mine_block`
pub fn setup_with(sync: SyncOptions) -> TestChains {
    build(sync, HandshakeConfig::default())
}

fn build(sync: SyncOptions, handshake: HandshakeConfig) -> TestChains {
    let config = HarnessConfig::default();
    let ledger_a = Arc::new(InMemoryLedger::new(LedgerConfig::new(CHAIN_A)).unwrap());
    let ledger_b = Arc::new(InMemoryLedger::new(LedgerConfig::new(CHAIN_B)).unwrap());

    let agent = |ledger: &Arc<InMemoryLedger>, chain_id: u64| {
        ChainAgent::new(
            ledger.clone(),
            config.get_chain(chain_id).unwrap(),
            handshake.clone(),
            sync,
        )
        .unwrap()
    };

    TestChains {
        a: agent(&ledger_a, CHAIN_A),
        b: agent(&ledger_b, CHAIN_B),
        ledger_a,
        ledger_b,
        producers: Vec::new(),
    }
}

/// Sync both agents and create a client on each chain for the other
pub async fn create_clients(chains: &mut TestChains) -> (String, String) {
    chains.a.update_header().await.unwrap();
    chains.b.update_header().await.unwrap();

    let client_a = chains.a.create_besu_client(&chains.b).await.unwrap();
    let client_b = chains.b.create_besu_client(&chains.a).await.unwrap();
    (client_a, client_b)
}
