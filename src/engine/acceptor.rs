//! Binds the listening socket and spawns one session task per connection
//! (`spec.md` §4.7 "Acceptor"), grounded on `Server::run`/`handle_connection`
//! in mail-laser's `smtp/mod.rs`.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio::net::TcpListener;

use crate::config::{EngineConfig, HandlerChainConfig};
use crate::engine::protocol::ProtocolEngine;
use crate::tls::TlsManager;

pub struct Acceptor {
    config: EngineConfig,
    chain_config: Arc<HandlerChainConfig>,
    tls_manager: Arc<TlsManager>,
}

impl Acceptor {
    pub fn new(config: EngineConfig, chain_config: HandlerChainConfig, tls_manager: TlsManager) -> Self {
        Acceptor {
            config,
            chain_config: Arc::new(chain_config),
            tls_manager: Arc::new(tls_manager),
        }
    }

    /// Binds and accepts forever. Each connection runs its `ProtocolEngine`
    /// on its own task so one slow or stuck client can't stall the others
    /// (`spec.md` §8 property 6, "session isolation").
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("rsmtpd listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("accepted connection from {}", peer);
                    let chain_config = Arc::clone(&self.chain_config);
                    let tls_manager = Arc::clone(&self.tls_manager);
                    let server_name = self.config.server_name.clone();
                    let max_message_size = self.config.max_message_size_bytes;
                    let max_line_length = self.config.max_line_length;
                    let spool_dir = self.config.spool_dir.clone();
                    let log_dir = self.config.log_dir.clone();

                    tokio::spawn(async move {
                        let engine = ProtocolEngine::new(
                            stream,
                            peer.ip(),
                            peer.port(),
                            server_name,
                            env!("CARGO_PKG_VERSION").to_string(),
                            chain_config,
                            tls_manager,
                            max_message_size,
                            max_line_length,
                            &spool_dir,
                            &log_dir,
                        );
                        engine.run().await;
                        info!("session with {} ended", peer);
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                }
            }
        }
    }
}
