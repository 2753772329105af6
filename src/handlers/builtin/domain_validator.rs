//! Sender-domain allow/block checks (`spec.md` §4.2), grounded on
//! `rsmtpd/handlers/domain_validator.py`.
//!
//! The original also verifies MX records and (optionally) that the MX host
//! answers SMTP, both live-network checks. `spec.md` §1 puts "DNS ...
//! calls inside handlers" out of scope for this engine, so MX presence is
//! expressed through an injectable [`MxResolver`] trait instead of a
//! hard-coded DNS client; a deployment plugs in its own resolver (or one
//! backed by `mail_auth::Resolver`, already a dependency) to get the live
//! check back.

use async_trait::async_trait;
use log::warn;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

/// Reports whether a domain has at least one MX record. Injected so the
/// handler itself performs no DNS I/O.
pub trait MxResolver: Send + Sync {
    fn has_mx_records(&self, domain: &str) -> bool;
}

/// Default resolver used when none is configured: assumes every domain is
/// routable. A deployment that wants the original's safety property
/// supplies a real resolver.
pub struct AlwaysRoutable;

impl MxResolver for AlwaysRoutable {
    fn has_mx_records(&self, _domain: &str) -> bool {
        true
    }
}

pub struct DomainValidatorHandler {
    pub domains_to_block: Vec<String>,
    pub resolver: Box<dyn MxResolver>,
}

impl Default for DomainValidatorHandler {
    fn default() -> Self {
        DomainValidatorHandler {
            domains_to_block: Vec::new(),
            resolver: Box::new(AlwaysRoutable),
        }
    }
}

impl DomainValidatorHandler {
    fn effective_domain<'a>(&self, mail_from_domain: Option<&'a str>, client_name: &'a str) -> &'a str {
        mail_from_domain.unwrap_or(client_name)
    }
}

#[async_trait]
impl CommandHandler for DomainValidatorHandler {
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
        let Some(client_name) = shared.client_name.as_ref() else {
            return pass_through;
        };

        let domain = self
            .effective_domain(mail_from.domain.as_deref(), &client_name.name)
            .to_string();

        if !client_name.is_valid_fqdn {
            warn!("Rejecting sender: client did not present a valid name");
            return Response::new(550, format!("We are not accepting emails from {domain} at this time"), Action::Ok);
        }

        for blocked in &self.domains_to_block {
            if &domain == blocked || domain.ends_with(&format!(".{blocked}")) {
                warn!("Rejecting sender: domain {domain} is blocked");
                return Response::new(550, format!("We are not accepting emails from {domain} at this time"), Action::Ok);
            }
        }

        if !self.resolver.has_mx_records(&domain) {
            warn!("Rejecting sender: domain {domain} has no MX records");
            return Response::new(550, format!("We are not accepting emails from {domain} at this time"), Action::Ok);
        }

        pass_through
    }
}
