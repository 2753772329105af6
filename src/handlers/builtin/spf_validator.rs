//! SPF check on MAIL FROM (`spec.md` §4.2 "a handler may reject based on
//! prior response"), grounded on `rsmtpd/handlers/spf_validator.py` and
//! `delfour-co-workspace--gk/mail-rs/src/authentication/spf.rs` for the
//! `mail_auth::Resolver` usage.
//!
//! Mirrors the Python handler's pass-through rule: if the previous
//! response in the chain wasn't 250, or there's no sender to check, this
//! handler does nothing and hands the previous response back unchanged.

use async_trait::async_trait;
use log::warn;
use mail_auth::{Resolver, SpfResult};

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

pub struct SpfValidatorHandler {
    resolver: Resolver,
}

impl SpfValidatorHandler {
    pub fn new() -> anyhow::Result<Self> {
        let resolver = Resolver::new_system_conf()?;
        Ok(SpfValidatorHandler { resolver })
    }
}

#[async_trait]
impl CommandHandler for SpfValidatorHandler {
    async fn handle(
        &self,
        _verb: &str,
        _argument: &str,
        shared: &mut SharedState,
        previous: Option<&Response>,
    ) -> Response {
        let pass_through = previous.cloned().unwrap_or_else(|| Response::new(250, "OK", Action::Ok));

        if pass_through.code != 250 {
            return pass_through;
        }

        let Some(mail_from) = shared.mail_from.as_ref() else {
            return pass_through;
        };
        if mail_from.email_address.is_empty() || !mail_from.is_valid {
            return pass_through;
        }

        let helo = shared
            .client_name
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("");
        let domain = mail_from.domain.as_deref().unwrap_or("");

        let output = self
            .resolver
            .verify_spf_sender(shared.client.ip, helo, domain, &mail_from.email_address)
            .await;

        match output.result() {
            SpfResult::Fail | SpfResult::SoftFail | SpfResult::PermError => {
                warn!("SPF check failed for {}: {:?}", mail_from.email_address, output.result());
                shared.mail_from.as_mut().unwrap().is_valid = false;
                Response::new(550, "Sender Policy Framework says you are not authorized", Action::Ok)
            }
            SpfResult::TempError => {
                warn!("SPF temporary error for {}", mail_from.email_address);
                shared.mail_from.as_mut().unwrap().is_valid = false;
                Response::new(450, "Temporary error while applying Sender Policy Framework; please try again later", Action::Ok)
            }
            _ => pass_through,
        }
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
    async fn skips_check_when_previous_response_was_not_250() {
        let Ok(handler) = SpfValidatorHandler::new() else {
            return;
        };
        let mut shared = state();
        let previous = Response::new(550, "rejected earlier", Action::Ok);
        let response = handler.handle("MAIL", "", &mut shared, Some(&previous)).await;
        assert_eq!(response.code, 550);
    }

    #[tokio::test]
    async fn skips_check_for_null_reverse_path() {
        let Ok(handler) = SpfValidatorHandler::new() else {
            return;
        };
        let mut shared = state();
        shared.mail_from = Some(crate::email::parse_address("<>"));
        let response = handler.handle("MAIL", "", &mut shared, None).await;
        assert_eq!(response.code, 250);
    }
}
