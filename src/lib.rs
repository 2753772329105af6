//! Wires together configuration, TLS, and the handler-chain engine into a
//! running SMTP listener. CLI parsing, chain-file discovery, and log sink
//! setup are left to the embedding application (`spec.md` §1) — this crate
//! starts from an already-loaded [`config::EngineConfig`] and an already-
//! parsed [`config::HandlerChainConfig`].

pub mod config;
pub mod email;
pub mod engine;
pub mod handlers;
pub mod net;
pub mod response;
pub mod session;
pub mod tls;

use anyhow::Result;
use log::info;

use config::{EngineConfig, HandlerChainConfig};
use engine::Acceptor;
use tls::TlsManager;

/// Runs the engine to completion (in practice, forever, until the process
/// is killed or the listener bind fails).
///
/// `chain_config` defaults to [`HandlerChainConfig::reject_all`] when the
/// caller has none to supply, matching the safe-by-default posture of
/// `spec.md` §7.
pub async fn run(config: EngineConfig, chain_config: Option<HandlerChainConfig>) -> Result<()> {
    info!(
        "starting {} v{} on {}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.bind_address,
        config.port
    );

    let tls_manager = TlsManager::load_all(config.tls_enabled, &config.tls_certificates);
    let chain_config = chain_config.unwrap_or_else(HandlerChainConfig::reject_all);

    let acceptor = Acceptor::new(config, chain_config, tls_manager);
    acceptor.run().await
}
