//! SNI-driven certificate selection and mid-session TLS upgrade
//! (`spec.md` §4.3), grounded on `rsmtpd/core/tls.py`.

use std::io::BufReader;
use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::response::{Action, Response};

/// One configured certificate: which server name it identifies as, the
/// substring of an incoming SNI `server_name` it should match, and the file
/// paths it was loaded from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CertEntry {
    pub server_name: String,
    pub domain_match: String,
    pub pem_file: String,
    pub key_file: String,
}

struct LoadedCertificate {
    entry: CertEntry,
    key: Arc<CertifiedKey>,
}

/// Resolves a `CertifiedKey` for a ClientHello by SNI substring match,
/// falling back to the first loaded certificate (`spec.md` §4.3 "SNI
/// selection algorithm").
struct SniResolver {
    certificates: Vec<LoadedCertificate>,
    /// The server name last handed out, so `TlsManager::wrap` can report it
    /// back to the caller (mirrors `TLS._server_name` in the Python source).
    selected: Mutex<Option<String>>,
}

impl SniResolver {
    fn select(&self, server_name: Option<&str>) -> &LoadedCertificate {
        if self.certificates.len() == 1 {
            return &self.certificates[0];
        }

        if let Some(server_name) = server_name {
            if !server_name.is_empty() {
                for cert in &self.certificates {
                    if server_name.contains(&cert.entry.domain_match) {
                        return cert;
                    }
                }
            }
        }

        &self.certificates[0]
    }
}

impl ResolvesServerCert for SniResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let server_name = client_hello.server_name();
        let chosen = self.select(server_name);
        *self.selected.lock().expect("SNI selection lock poisoned") =
            Some(chosen.entry.server_name.clone());
        Some(chosen.key.clone())
    }
}

/// Holds the certificate table and hands out prepared TLS contexts. Certs
/// are loaded once at startup (before privilege dropping, per `spec.md`
/// §4.3) and are immutable thereafter.
pub struct TlsManager {
    acceptor: Option<TlsAcceptor>,
    resolver: Option<Arc<SniResolver>>,
}

impl TlsManager {
    /// Attempts to parse every configured certificate/key pair. Entries that
    /// fail to parse are warned about and excluded; if none succeed, TLS is
    /// disabled globally.
    pub fn load_all(enabled: bool, entries: &[CertEntry]) -> Self {
        if !enabled || entries.is_empty() {
            return TlsManager {
                acceptor: None,
                resolver: None,
            };
        }

        let mut loaded = Vec::new();
        for entry in entries {
            match load_certified_key(entry) {
                Ok(key) => loaded.push(LoadedCertificate {
                    entry: entry.clone(),
                    key: Arc::new(key),
                }),
                Err(e) => warn!(
                    "Certificate for {} disabled: {}",
                    entry.server_name, e
                ),
            }
        }

        if loaded.is_empty() {
            warn!("No valid certificates could be loaded; TLS disabled");
            return TlsManager {
                acceptor: None,
                resolver: None,
            };
        }

        info!("TLS initialized with {} certificate(s)", loaded.len());
        let resolver = Arc::new(SniResolver {
            certificates: loaded,
            selected: Mutex::new(None),
        });
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_cert_resolver(resolver.clone() as Arc<dyn ResolvesServerCert>);

        TlsManager {
            acceptor: Some(TlsAcceptor::from(Arc::new(config))),
            resolver: Some(resolver),
        }
    }

    pub fn enabled(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Performs the TLS handshake in server mode. Returns the encrypted
    /// stream and the server name selected by SNI on success. `tokio_rustls`
    /// consumes the `TcpStream` into the handshake future and does not hand
    /// it back on failure, so the socket is duplicated up front: the
    /// duplicate rides out the handshake attempt untouched and is returned
    /// to the caller as a still-usable plaintext stream if the handshake
    /// fails (`spec.md` §4.4 step 3 / §7 "TLS failures": the session stays
    /// up in plaintext with a 454, the same as `rsmtpd/core/tls.py`'s
    /// `TLS.start()` returning `(connection, SmtpResponse454())`).
    pub async fn wrap(
        &self,
        stream: TcpStream,
    ) -> Result<(tokio_rustls::server::TlsStream<TcpStream>, Option<String>), (TcpStream, anyhow::Error)> {
        let (Some(acceptor), Some(resolver)) = (&self.acceptor, &self.resolver) else {
            return Err((stream, anyhow::anyhow!("TLS not enabled")));
        };

        let std_stream = stream
            .into_std()
            .expect("a connected tokio TcpStream always converts to std");
        let fallback = std_stream
            .try_clone()
            .expect("duplicating the socket descriptor failed");
        let stream =
            TcpStream::from_std(std_stream).expect("a nonblocking std stream always converts back");

        match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                let selected = resolver
                    .selected
                    .lock()
                    .expect("SNI selection lock poisoned")
                    .clone();
                Ok((tls_stream, selected))
            }
            Err(e) => {
                error!("TLS handshake failed: {}", e);
                let fallback = TcpStream::from_std(fallback)
                    .expect("a nonblocking std stream always converts back");
                Err((fallback, e.into()))
            }
        }
    }
}

/// 454 response for a STARTTLS request the engine cannot honor, either
/// because TLS is disabled or the handshake itself failed.
pub fn tls_unavailable_response() -> Response {
    Response::new(454, "TLS not available due to temporary reason", Action::Ok)
}

fn load_certified_key(entry: &CertEntry) -> anyhow::Result<CertifiedKey> {
    let cert_file = std::fs::File::open(&entry.pem_file)?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_reader).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", entry.pem_file);
    }

    let key_file = std::fs::File::open(&entry.key_file)?;
    let mut key_reader = BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", entry.key_file))?;

    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)?;
    Ok(CertifiedKey::new(certs, signing_key))
}
