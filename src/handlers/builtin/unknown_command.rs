//! Fallback for verbs with no configured chain, grounded on
//! `rsmtpd/handlers/unknown_command.py`. Wired to the `__DEFAULT__` key in
//! `HandlerChainConfig` (`spec.md` §6).

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct UnknownCommandHandler;

#[async_trait]
impl CommandHandler for UnknownCommandHandler {
    async fn handle(
        &self,
        _verb: &str,
        _argument: &str,
        _shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        Response::new(500, "Syntax error, command unrecognized", Action::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn always_returns_500() {
        let mut shared = SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            false,
        );
        let response = UnknownCommandHandler.handle("FROB", "", &mut shared, None).await;
        assert_eq!(response.code, 500);
    }
}
