//! Runtime configuration (`spec.md` §6).
//!
//! [`EngineConfig`] holds the settings an operator supplies through the
//! environment (bind address, TLS certificates, spool/log directories),
//! following mail-laser's `Config::from_env` pattern: required variables
//! produce a contextual `anyhow` error, optional variables fall back to a
//! logged default. [`HandlerChainConfig`] is a separate, `serde`-driven
//! structure for the verb → handler-chain mapping; actually finding a
//! chain-config file on disk given a CLI flag is left to the embedding
//! application, per `spec.md` §1.

mod chain;

pub use chain::{ChainEntry, HandlerChainConfig};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::tls::CertEntry;

/// Settings loaded from environment variables prefixed `RSMTPD_`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The IP address the SMTP server should listen on. (Optional:
    /// `RSMTPD_BIND_ADDRESS`, Default: "0.0.0.0")
    pub bind_address: String,

    /// The network port the SMTP server should listen on. (Optional:
    /// `RSMTPD_PORT`, Default: 2525)
    pub port: u16,

    /// The name this server presents in its banner, HELO/EHLO responses,
    /// and `Received:` headers. (Optional: `RSMTPD_SERVER_NAME`, Default:
    /// the machine's hostname if resolvable, else "localhost")
    pub server_name: String,

    /// Whether TLS/STARTTLS is offered at all. (Optional:
    /// `RSMTPD_TLS_ENABLED`, Default: false)
    pub tls_enabled: bool,

    /// Certificates to load when `tls_enabled` is true. (Optional:
    /// `RSMTPD_TLS_CERTIFICATES`, `;`-separated
    /// `server_name:domain_match:pem_file:key_file` tuples, Default: empty)
    pub tls_certificates: Vec<CertEntry>,

    /// Hard cap on message size in bytes, enforced by `builtin::data_file`
    /// and advertised in the EHLO `SIZE` extension. (Optional:
    /// `RSMTPD_MAX_MESSAGE_SIZE_BYTES`, Default: 8388608)
    pub max_message_size_bytes: u64,

    /// Maximum bytes for a single protocol line before `LineTooLong`.
    /// (Optional: `RSMTPD_MAX_LINE_LENGTH`, Default: 1024)
    pub max_line_length: usize,

    /// Where `builtin::data_file` spools accepted messages. (Optional:
    /// `RSMTPD_SPOOL_DIR`, Default: "/var/tmp")
    pub spool_dir: String,

    /// Where `builtin::transaction_log` writes per-session transcripts, if
    /// configured into the chain at all. (Optional: `RSMTPD_LOG_DIR`,
    /// Default: "/var/tmp")
    pub log_dir: String,
}

impl EngineConfig {
    /// Loads configuration from the environment, loading a `.env` file
    /// first if one is present (mirrors mail-laser's `Config::from_env`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let bind_address = env::var("RSMTPD_BIND_ADDRESS").unwrap_or_else(|_| {
            let default_val = "0.0.0.0".to_string();
            log::info!("Config: Using default bind_address: {}", default_val);
            default_val
        });

        let port_str = env::var("RSMTPD_PORT").unwrap_or_else(|_| "2525".to_string());
        let port: u16 = port_str
            .parse()
            .map_err(|e| anyhow!("RSMTPD_PORT ('{}') must be a valid u16 port number: {}", port_str, e))?;
        log::info!("Config: Using port: {}", port);

        let server_name = env::var("RSMTPD_SERVER_NAME").unwrap_or_else(|_| {
            let default_val = "localhost".to_string();
            log::info!("Config: Using default server_name: {}", default_val);
            default_val
        });

        let tls_enabled = env::var("RSMTPD_TLS_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        log::info!("Config: Using tls_enabled: {}", tls_enabled);

        let tls_certificates = match env::var("RSMTPD_TLS_CERTIFICATES") {
            Ok(val) => parse_cert_entries(&val)?,
            Err(_) => Vec::new(),
        };
        log::info!("Config: Loaded {} TLS certificate entries", tls_certificates.len());

        let max_message_size_bytes: u64 = env::var("RSMTPD_MAX_MESSAGE_SIZE_BYTES")
            .unwrap_or_else(|_| (8 * 1024 * 1024).to_string())
            .parse()
            .map_err(|e| anyhow!("RSMTPD_MAX_MESSAGE_SIZE_BYTES must be a valid u64: {}", e))?;
        log::info!("Config: Using max_message_size_bytes: {}", max_message_size_bytes);

        let max_line_length: usize = env::var("RSMTPD_MAX_LINE_LENGTH")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .map_err(|e| anyhow!("RSMTPD_MAX_LINE_LENGTH must be a valid usize: {}", e))?;
        log::info!("Config: Using max_line_length: {}", max_line_length);

        let spool_dir = env::var("RSMTPD_SPOOL_DIR").unwrap_or_else(|_| "/var/tmp".to_string());
        log::info!("Config: Using spool_dir: {}", spool_dir);

        let log_dir = env::var("RSMTPD_LOG_DIR").unwrap_or_else(|_| "/var/tmp".to_string());
        log::info!("Config: Using log_dir: {}", log_dir);

        Ok(EngineConfig {
            bind_address,
            port,
            server_name,
            tls_enabled,
            tls_certificates,
            max_message_size_bytes,
            max_line_length,
            spool_dir,
            log_dir,
        })
    }
}

/// Parses `server_name:domain_match:pem_file:key_file` tuples separated by
/// `;`. There is no escaping: paths containing `:` or `;` aren't
/// supported, matching the original rsmtpd YAML chain config's own
/// flat-tuple style for this kind of list.
fn parse_cert_entries(raw: &str) -> Result<Vec<CertEntry>> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            if parts.len() != 4 {
                return Err(anyhow!(
                    "RSMTPD_TLS_CERTIFICATES entry '{}' must be server_name:domain_match:pem_file:key_file",
                    entry
                ));
            }
            Ok(CertEntry {
                server_name: parts[0].to_string(),
                domain_match: parts[1].to_string(),
                pem_file: parts[2].to_string(),
                key_file: parts[3].to_string(),
            })
        })
        .collect()
}
