//! RCPT TO (`spec.md` §4.2), grounded on `rsmtpd/handlers/recipient.py` and
//! `validators/email_address/simple_recipient_validator.py`. The original
//! supports a pluggable recipient validator (mailbox existence, domain
//! disable lists, ...); that collaborator is an external integration point
//! per `spec.md` §1, so this handler only performs the syntactic check the
//! "simple" validator itself did.

use async_trait::async_trait;

use crate::email::parse_address;
use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct RecipientHandler;

#[async_trait]
impl CommandHandler for RecipientHandler {
    async fn handle(
        &self,
        _verb: &str,
        argument: &str,
        shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if shared.client_name.is_none() {
            return Response::new(503, "You must say HELO/EHLO before using this command", Action::Ok);
        }

        if !argument.to_uppercase().starts_with("TO:") {
            return Response::new(504, "Only RCPT TO: is implemented on this server", Action::Ok);
        }

        let parsed = parse_address(argument.splitn(2, ':').nth(1).unwrap_or(""));
        if !parsed.is_valid || parsed.email_address.is_empty() {
            return Response::new(501, "Email address does not appear to be valid", Action::Ok);
        }

        shared.recipients.insert(parsed.address_key());
        shared.recipients_raw.push(parsed);
        Response::new(250, "OK", Action::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ClientName;
    use std::net::{IpAddr, Ipv4Addr};

    fn state_with_helo() -> SharedState {
        let mut s = SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            false,
        );
        s.client_name = Some(ClientName {
            name: "client.example".into(),
            is_valid_fqdn: true,
            forward_dns_ip: None,
            reverse_dns_name: None,
        });
        s
    }

    #[tokio::test]
    async fn accepts_valid_recipient() {
        let mut shared = state_with_helo();
        let response = RecipientHandler.handle("RCPT", "TO:<c@d.com>", &mut shared, None).await;
        assert_eq!(response.code, 250);
        assert!(shared.recipients.contains("c@d.com"));
    }

    #[tokio::test]
    async fn rejects_invalid_address() {
        let mut shared = state_with_helo();
        let response = RecipientHandler.handle("RCPT", "TO:<not valid>", &mut shared, None).await;
        assert_eq!(response.code, 501);
    }

    #[tokio::test]
    async fn accumulates_multiple_recipients() {
        let mut shared = state_with_helo();
        RecipientHandler.handle("RCPT", "TO:<a@b.com>", &mut shared, None).await;
        RecipientHandler.handle("RCPT", "TO:<c@d.com>", &mut shared, None).await;
        assert_eq!(shared.recipients.len(), 2);
    }
}
