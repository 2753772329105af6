//! DATA command verb (`spec.md` §4.4 response code table, scenario 4),
//! grounded on `rsmtpd/handlers/data.py`. Distinct from
//! [`super::data_file::DataFileHandler`]: this handler answers the `DATA`
//! verb itself (sequencing checks, 354 to start the body), the other
//! answers the `__DATA__` pseudo-verb that streams the body once this one
//! has said go ahead.

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct DataHandler;

#[async_trait]
impl CommandHandler for DataHandler {
    async fn handle(
        &self,
        _verb: &str,
        argument: &str,
        shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if !argument.is_empty() {
            return Response::new(501, "Unexpected argument to DATA", Action::Invalid);
        }

        if shared.client_name.is_none() {
            return Response::new(503, "You must say HELO/EHLO before using this command", Action::Ok);
        }

        if shared.mail_from.is_none() {
            return Response::new(503, "You must first use the MAIL command before attempting to send DATA", Action::Ok);
        }

        if shared.recipients.is_empty() {
            return Response::new(503, "You must provide one or more valid recipients before attempting to send DATA", Action::Ok);
        }

        Response::new(354, "Start mail input; end with <CRLF>.<CRLF>", Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::parse_address;
    use crate::session::ClientName;
    use std::net::{IpAddr, Ipv4Addr};

    fn state() -> SharedState {
        SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            false,
        )
    }

    fn ready_state() -> SharedState {
        let mut s = state();
        s.client_name = Some(ClientName {
            name: "client.example".into(),
            is_valid_fqdn: true,
            forward_dns_ip: None,
            reverse_dns_name: None,
        });
        s.mail_from = Some(parse_address("<a@b.com>"));
        s.recipients.insert("c@d.com".into());
        s
    }

    #[tokio::test]
    async fn rejects_data_before_helo() {
        let response = DataHandler.handle("DATA", "", &mut state(), None).await;
        assert_eq!(response.code, 503);
    }

    #[tokio::test]
    async fn rejects_data_before_mail() {
        let mut shared = state();
        shared.client_name = Some(ClientName {
            name: "client.example".into(),
            is_valid_fqdn: true,
            forward_dns_ip: None,
            reverse_dns_name: None,
        });
        let response = DataHandler.handle("DATA", "", &mut shared, None).await;
        assert_eq!(response.code, 503);
    }

    #[tokio::test]
    async fn rejects_data_without_recipients() {
        let mut shared = ready_state();
        shared.recipients.clear();
        let response = DataHandler.handle("DATA", "", &mut shared, None).await;
        assert_eq!(response.code, 503);
    }

    #[tokio::test]
    async fn rejects_argument_to_data() {
        let response = DataHandler.handle("DATA", "unexpected", &mut ready_state(), None).await;
        assert_eq!(response.code, 501);
    }

    #[tokio::test]
    async fn continues_to_data_phase_when_ready() {
        let response = DataHandler.handle("DATA", "", &mut ready_state(), None).await;
        assert_eq!(response.code, 354);
        assert_eq!(response.action, Action::Continue);
    }
}
