//! HELO/EHLO (`spec.md` §4.2 "ESMTP capability advertisement"), grounded on
//! `rsmtpd/handlers/hello.py`.
//!
//! The original handler resolves the client name via live forward/reverse
//! DNS lookups. `spec.md` §1 puts "DNS ... calls inside handlers" out of
//! scope for this engine, so `is_valid_fqdn` here is a syntactic check only
//! (does the name look like a dotted hostname) — a deployment that wants
//! real DNS validation plugs it in as its own handler further down the
//! chain, the same way `domain_validator` does for senders.

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::{ClientName, SharedState};

#[derive(Default)]
pub struct HelloHandler {
    pub advertise_pipelining: bool,
}

#[async_trait]
impl CommandHandler for HelloHandler {
    async fn handle(
        &self,
        verb: &str,
        argument: &str,
        shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        shared.esmtp_capable = verb.eq_ignore_ascii_case("EHLO");

        let name = argument.trim().to_string();
        let is_valid_fqdn = !name.is_empty() && name.contains('.');

        shared.client_name = Some(ClientName {
            name: name.clone(),
            is_valid_fqdn,
            forward_dns_ip: None,
            reverse_dns_name: None,
        });
        shared.client.advertised_name = name;

        let mut extensions = vec![format!("SIZE {}", shared.max_message_size), "8BITMIME".to_string(), "SMTPUTF8".to_string()];
        if shared.client.tls_available && !shared.client.tls_enabled {
            extensions.push("STARTTLS".to_string());
        }
        if self.advertise_pipelining {
            extensions.push("PIPELINING".to_string());
        }

        let greeting = "Hello <client.advertised_name> (<client.ip> port <client.port>)".to_string();
        let mut lines = vec![greeting.clone()];
        lines.extend(extensions);

        Response::new(250, greeting, Action::Ok).with_multi_line(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn state() -> SharedState {
        SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            true,
        )
    }

    #[tokio::test]
    async fn ehlo_sets_esmtp_capable_and_advertises_starttls() {
        let mut shared = state();
        let response = HelloHandler::default()
            .handle("EHLO", "client.example.com", &mut shared, None)
            .await;
        assert!(shared.esmtp_capable);
        assert_eq!(response.code, 250);
        let lines = response.multi_line.unwrap();
        assert!(lines.iter().any(|l| l == "STARTTLS"));
        assert!(lines.iter().any(|l| l.starts_with("SIZE ")));
    }

    #[tokio::test]
    async fn helo_does_not_set_esmtp_capable() {
        let mut shared = state();
        HelloHandler::default().handle("HELO", "client.example.com", &mut shared, None).await;
        assert!(!shared.esmtp_capable);
    }

    #[tokio::test]
    async fn name_without_dot_is_not_a_valid_fqdn() {
        let mut shared = state();
        HelloHandler::default().handle("HELO", "localhost", &mut shared, None).await;
        assert!(!shared.client_name.unwrap().is_valid_fqdn);
    }

    #[tokio::test]
    async fn starttls_not_advertised_once_tls_enabled() {
        let mut shared = state();
        shared.client.tls_enabled = true;
        let response = HelloHandler::default().handle("EHLO", "a.b", &mut shared, None).await;
        let lines = response.multi_line.unwrap();
        assert!(!lines.iter().any(|l| l == "STARTTLS"));
    }
}
