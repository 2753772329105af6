//! RSET (`spec.md` §4.2), grounded on `rsmtpd/handlers/reset.py`.

use async_trait::async_trait;
use log::warn;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct ResetHandler;

#[async_trait]
impl CommandHandler for ResetHandler {
    async fn handle(
        &self,
        _verb: &str,
        argument: &str,
        shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if !argument.is_empty() {
            return Response::new(501, "Syntax error in parameters or arguments", Action::Ok);
        }

        shared.reset_transaction();
        if let Some(filename) = shared.data_filename.take() {
            if let Err(e) = std::fs::remove_file(&filename) {
                warn!("Error deleting spool file {} during RSET: {}", filename, e);
            }
        }

        Response::new(250, "OK", Action::Ok)
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
    async fn clears_transaction_state() {
        let mut shared = state();
        shared.mail_from = Some(crate::email::parse_address("<a@b.com>"));
        shared.recipients.insert("c@d.com".into());
        let response = ResetHandler.handle("RSET", "", &mut shared, None).await;
        assert_eq!(response.code, 250);
        assert!(shared.mail_from.is_none());
        assert!(shared.recipients.is_empty());
    }

    #[tokio::test]
    async fn rejects_argument() {
        let mut shared = state();
        let response = ResetHandler.handle("RSET", "oops", &mut shared, None).await;
        assert_eq!(response.code, 501);
    }
}
