//! QUIT, per RFC 5321 §4.3.2 including the 501-on-argument case, grounded
//! on `rsmtpd/handlers/quit.py`.

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct QuitHandler;

#[async_trait]
impl CommandHandler for QuitHandler {
    async fn handle(
        &self,
        _verb: &str,
        argument: &str,
        _shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if !argument.is_empty() {
            return Response::new(501, "Syntax error in parameters or arguments", Action::Ok);
        }

        Response::new(221, "<server_name> Service closing transmission channel", Action::Close)
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
    async fn quit_closes_the_connection() {
        let mut shared = state();
        let response = QuitHandler.handle("QUIT", "", &mut shared, None).await;
        assert_eq!(response.code, 221);
        assert_eq!(response.action, Action::Close);
    }

    #[tokio::test]
    async fn quit_with_argument_is_rejected() {
        let mut shared = state();
        let response = QuitHandler.handle("QUIT", "now", &mut shared, None).await;
        assert_eq!(response.code, 501);
    }
}
