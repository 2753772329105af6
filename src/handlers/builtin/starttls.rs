//! STARTTLS gating, grounded on `rsmtpd/handlers/starttls.py`. This handler
//! only decides whether the upgrade may proceed; the actual handshake swap
//! is performed by the protocol engine on [`Action::StartTls`]
//! (`spec.md` §4.3 "mid-session upgrade").

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct StartTlsHandler;

#[async_trait]
impl CommandHandler for StartTlsHandler {
    async fn handle(
        &self,
        _verb: &str,
        _argument: &str,
        shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        if !shared.client.tls_available {
            return Response::new(500, "Syntax error, command unrecognized", Action::Ok);
        }

        if shared.client.tls_enabled {
            return Response::new(503, "TLS already started", Action::Ok);
        }

        Response::new(220, "TLS go ahead", Action::StartTls)
    }
}
