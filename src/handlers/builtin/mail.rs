//! MAIL FROM (`spec.md` §4.2), grounded on `rsmtpd/handlers/mail.py`.

use async_trait::async_trait;

use crate::email::parse_address;
use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct MailHandler;

#[async_trait]
impl CommandHandler for MailHandler {
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

        if !argument.to_uppercase().starts_with("FROM:") {
            return Response::new(504, "Only MAIL FROM: is implemented on this server", Action::Ok);
        }

        let parsed = parse_address(argument.splitn(2, ':').nth(1).unwrap_or(""));
        let is_valid = parsed.is_valid;
        let is_bounce = parsed.email_address.is_empty();
        shared.mail_from = Some(parsed);

        if !is_valid {
            return Response::new(501, "Email address does not appear to be valid", Action::Ok);
        }

        if is_bounce {
            return Response::new(250, "Accepting bounced message", Action::Ok);
        }

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
    async fn rejects_mail_before_helo() {
        let mut shared = SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            false,
        );
        let response = MailHandler.handle("MAIL", "FROM:<a@b.com>", &mut shared, None).await;
        assert_eq!(response.code, 503);
    }

    #[tokio::test]
    async fn accepts_valid_sender() {
        let mut shared = state_with_helo();
        let response = MailHandler.handle("MAIL", "FROM:<a@b.com>", &mut shared, None).await;
        assert_eq!(response.code, 250);
        assert_eq!(shared.mail_from.unwrap().email_address, "a@b.com");
    }

    #[tokio::test]
    async fn rejects_non_from_argument() {
        let mut shared = state_with_helo();
        let response = MailHandler.handle("MAIL", "TO:<a@b.com>", &mut shared, None).await;
        assert_eq!(response.code, 504);
    }

    #[tokio::test]
    async fn accepts_null_reverse_path_as_bounce() {
        let mut shared = state_with_helo();
        let response = MailHandler.handle("MAIL", "FROM:<>", &mut shared, None).await;
        assert_eq!(response.code, 250);
        assert_eq!(response.message, "Accepting bounced message");
    }
}
