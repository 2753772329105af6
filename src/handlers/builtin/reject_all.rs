//! The RFC 7504 safety default: reject every command with 521, and if
//! wired as the DATA handler, reject with 521 there too. This is what
//! `HandlerChainConfig::default()` maps every verb to (`spec.md` §6, "safe
//! by default"), grounded on `rsmtpd/handlers/reject_all.py`.

use async_trait::async_trait;

use crate::handlers::{CommandHandler, DataCommandHandler};
use crate::response::{Action, Response};
use crate::session::SharedState;

pub struct RejectAllHandler {
    pub close_connection: bool,
}

impl Default for RejectAllHandler {
    fn default() -> Self {
        RejectAllHandler {
            close_connection: true,
        }
    }
}

#[async_trait]
impl CommandHandler for RejectAllHandler {
    async fn handle(
        &self,
        verb: &str,
        _argument: &str,
        _shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if self.close_connection {
            return Response::new(521, "Server does not accept mail", Action::Close);
        }

        if verb.eq_ignore_ascii_case("DATA") {
            return Response::new(351, "Start mail input; end with <CRLF>.<CRLF>", Action::Continue);
        }

        Response::new(521, "Server does not accept mail", Action::Ok)
    }
}

#[async_trait]
impl DataCommandHandler for RejectAllHandler {
    async fn handle_data(&self, _chunk: &[u8], _shared: &mut SharedState) {}

    async fn handle_data_end(&self, _shared: &mut SharedState) -> Response {
        Response::new(521, "Server does not accept mail", Action::Ok)
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
            false,
        )
    }

    #[tokio::test]
    async fn closes_connection_by_default() {
        let mut shared = state();
        let response = RejectAllHandler::default().handle("HELO", "", &mut shared, None).await;
        assert_eq!(response.code, 521);
        assert_eq!(response.action, Action::Close);
    }

    #[tokio::test]
    async fn accepts_data_continuation_when_configured_open() {
        let handler = RejectAllHandler { close_connection: false };
        let mut shared = state();
        let response = handler.handle("DATA", "", &mut shared, None).await;
        assert_eq!(response.code, 351);
        assert_eq!(response.action, Action::Continue);
    }
}
