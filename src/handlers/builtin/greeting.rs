//! Connection-open greeting (`spec.md` §4.4 step 1, "synthetic `__OPEN__`
//! verb"), grounded on `rsmtpd/handlers/greeting.py`.

use async_trait::async_trait;

use crate::handlers::CommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

#[derive(Default)]
pub struct GreetingHandler;

#[async_trait]
impl CommandHandler for GreetingHandler {
    async fn handle(
        &self,
        _verb: &str,
        _argument: &str,
        _shared: &mut SharedState,
        _previous: Option<&Response>,
    ) -> Response {
        Response::new(220, "<server_name> service ready", Action::Ok)
    }
}
