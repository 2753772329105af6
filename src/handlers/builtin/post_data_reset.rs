//! Clears transaction state once the DATA handler chain has finished
//! (`spec.md` §4.5 "post-DATA reset"), grounded on
//! `rsmtpd/handlers/post_data_reset.py`. Placed last in the DATA handler
//! chain: it passes through whatever response the prior data handler left
//! in `shared.current_command.response` rather than producing its own.

use async_trait::async_trait;
use log::warn;

use crate::handlers::DataCommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

pub struct PostDataResetHandler {
    pub keep_data_file: bool,
}

impl Default for PostDataResetHandler {
    fn default() -> Self {
        PostDataResetHandler { keep_data_file: false }
    }
}

#[async_trait]
impl DataCommandHandler for PostDataResetHandler {
    async fn handle_data(&self, _chunk: &[u8], _shared: &mut SharedState) {}

    async fn handle_data_end(&self, shared: &mut SharedState) -> Response {
        shared.reset_transaction();
        if let Some(filename) = shared.data_filename.take() {
            if !self.keep_data_file {
                if let Err(e) = std::fs::remove_file(&filename) {
                    warn!("Error deleting spool file {} during post-DATA reset: {}", filename, e);
                }
            }
        }

        shared
            .current_command
            .response
            .clone()
            .unwrap_or_else(|| Response::new(250, "OK", Action::Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn clears_transaction_and_passes_through_response() {
        let mut shared = SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".into(),
            "rsmtpd/0.1.0".into(),
            false,
        );
        shared.mail_from = Some(crate::email::parse_address("<a@b.com>"));
        shared.recipients.insert("c@d.com".into());
        shared.current_command.response = Some(Response::new(250, "OK", Action::Ok));

        let handler = PostDataResetHandler::default();
        let response = handler.handle_data_end(&mut shared).await;
        assert_eq!(response.code, 250);
        assert!(shared.mail_from.is_none());
        assert!(shared.recipients.is_empty());
    }
}
