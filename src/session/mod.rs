//! Per-session mutable context (`spec.md` §3, "Session (SharedState)").
//!
//! One [`SharedState`] is created on accept and dropped on close. It is
//! never shared between sessions — see `spec.md` §8 property 6, "Session
//! isolation" — so it carries no synchronization of its own.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use uuid::Uuid;

use crate::email::ParsedAddress;
use crate::response::Response;

/// Client connection facts, plus the one piece of protocol state
/// (`advertised_name`) that starts out synthesized and later reflects what
/// HELO/EHLO said.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: IpAddr,
    pub port: u16,
    pub tls_available: bool,
    pub tls_enabled: bool,
    pub advertised_name: String,
}

impl ClientInfo {
    pub fn new(ip: IpAddr, port: u16, tls_available: bool) -> Self {
        ClientInfo {
            ip,
            port,
            tls_available,
            tls_enabled: false,
            advertised_name: format!("[{}:{}]", ip, port),
        }
    }
}

/// Set by the HELO/EHLO handler once the client has identified itself.
#[derive(Debug, Clone)]
pub struct ClientName {
    pub name: String,
    pub is_valid_fqdn: bool,
    pub forward_dns_ip: Option<IpAddr>,
    pub reverse_dns_name: Option<String>,
}

/// Scratch state for the command currently being processed, reset at the
/// start of every chain dispatch (`spec.md` §4.4 step 2).
#[derive(Debug, Clone, Default)]
pub struct CurrentCommand {
    pub buffer_empty: bool,
    pub response: Option<Response>,
}

/// Per-session mutable context passed to every handler.
pub struct SharedState {
    pub transaction_id: Uuid,
    pub server_name: String,
    pub server_version: String,
    pub client: ClientInfo,
    pub client_name: Option<ClientName>,
    pub esmtp_capable: bool,
    pub max_message_size: u64,
    pub mail_from: Option<ParsedAddress>,
    pub recipients: HashSet<String>,
    pub recipients_raw: Vec<ParsedAddress>,
    pub data_filename: Option<String>,
    pub last_command_had_standard_line_ending: bool,
    pub current_command: CurrentCommand,
    extensions: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl SharedState {
    pub fn new(
        ip: IpAddr,
        port: u16,
        server_name: String,
        server_version: String,
        tls_available: bool,
    ) -> Self {
        SharedState {
            transaction_id: Uuid::new_v4(),
            server_name,
            server_version,
            client: ClientInfo::new(ip, port, tls_available),
            client_name: None,
            esmtp_capable: false,
            max_message_size: 8 * 1024 * 1024,
            mail_from: None,
            recipients: HashSet::new(),
            recipients_raw: Vec::new(),
            data_filename: None,
            last_command_had_standard_line_ending: true,
            current_command: CurrentCommand::default(),
            extensions: HashMap::new(),
        }
    }

    /// Invariant 1: DATA may be accepted once there's at least one
    /// recipient, a sender, and a client name.
    pub fn can_accept_data(&self) -> bool {
        !self.recipients.is_empty() && self.mail_from.is_some() && self.client_name.is_some()
    }

    /// RSET / post-DATA reset: clears the transaction but not the HELO
    /// identity or ESMTP capability, matching `handlers/reset.py`.
    pub fn reset_transaction(&mut self) {
        self.mail_from = None;
        self.recipients.clear();
        self.recipients_raw.clear();
    }

    /// A handler's own per-session scratch slot, keyed by a constant the
    /// handler owns (e.g. its registry key). Handlers must only read/write
    /// under their own key (`spec.md` §9).
    pub fn extension_mut<T: Any + Send + Default>(&mut self, key: &'static str) -> &mut T {
        self.extensions
            .entry(key)
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut::<T>()
            .expect("extension slot type mismatch for key")
    }

    pub fn extension<T: Any + Send>(&self, key: &'static str) -> Option<&T> {
        self.extensions.get(key).and_then(|v| v.downcast_ref::<T>())
    }
}
