//! Typed SMTP response values and wire rendering.
//!
//! A [`Response`] is the only thing a handler chain may use to influence what
//! goes back over the wire. It is immutable once built: the session loop
//! clones it (cheaply, it's plain data) rather than mutating it in place, so
//! a handler can never observe a half-updated response from an earlier
//! handler in the chain (see `spec.md` §9, "Deep-copying responses between
//! chain steps").

use crate::session::SharedState;

/// What the [`crate::engine::protocol::ProtocolEngine`] should do once a
/// response has been produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Normal: emit the response and read the next command.
    Ok,
    /// Valid response to DATA: emit 354 and hand control to the data reader.
    Continue,
    /// The response was in reply to something invalid; treated like `Ok` by
    /// the engine but kept distinct so handlers can tell the two apart.
    Invalid,
    /// Emit the response, then close the connection.
    Close,
    /// Close the connection immediately; no response is sent.
    ForceClose,
    /// Emit the response, then attempt the STARTTLS handshake.
    StartTls,
}

/// An immutable SMTP response.
///
/// `message` is always present and is what gets sent for a single-line
/// response. `multi_line`, when set, is rendered instead (see
/// [`Response::render`]) with `message` acting only as a fallback for
/// non-ESMTP clients wherever the caller wants the short form (the handler
/// decides whether to set both).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub message: String,
    pub multi_line: Option<Vec<String>>,
    pub action: Action,
}

impl Response {
    pub fn new(code: u16, message: impl Into<String>, action: Action) -> Self {
        Response {
            code,
            message: message.into(),
            multi_line: None,
            action,
        }
    }

    pub fn with_multi_line(mut self, lines: Vec<String>) -> Self {
        self.multi_line = Some(lines);
        self
    }

    /// Renders the response for the wire, substituting `<server_name>`,
    /// `<version>`, `<client.ip>`, `<client.port>` and
    /// `<client.advertised_name>` tokens. `extended` selects the multi-line
    /// dash-continuation form (used when `shared.esmtp_capable`); a response
    /// with no `multi_line` set always renders as a single line regardless
    /// of `extended`.
    pub fn render(&self, extended: bool, shared: &SharedState) -> String {
        let lines: Vec<String> = match (&self.multi_line, extended) {
            (Some(lines), true) if !lines.is_empty() => lines.clone(),
            _ => vec![self.message.clone()],
        };

        let mut out = String::new();
        let last = lines.len() - 1;
        for (i, line) in lines.iter().enumerate() {
            let substituted = substitute_templates(line, shared);
            let sep = if i == last { ' ' } else { '-' };
            out.push_str(&format!("{}{}{}\r\n", self.code, sep, substituted));
        }
        out
    }
}

fn substitute_templates(line: &str, shared: &SharedState) -> String {
    line.replace("<server_name>", &shared.server_name)
        .replace("<version>", &shared.server_version)
        .replace("<client.ip>", &shared.client.ip.to_string())
        .replace("<client.port>", &shared.client.port.to_string())
        .replace("<client.advertised_name>", &shared.client.advertised_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SharedState;
    use std::net::{IpAddr, Ipv4Addr};

    fn state() -> SharedState {
        SharedState::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            2525,
            "mail.example.com".to_string(),
            "rsmtpd/0.1.0".to_string(),
            false,
        )
    }

    #[test]
    fn single_line_renders_with_space_separator() {
        let shared = state();
        let r = Response::new(220, "<server_name> ESMTP ready", Action::Ok);
        assert_eq!(r.render(true, &shared), "220 mail.example.com ESMTP ready\r\n");
    }

    #[test]
    fn multi_line_uses_dash_except_last_line() {
        let shared = state();
        let r = Response::new(250, "mail.example.com greets you", Action::Ok).with_multi_line(vec![
            "mail.example.com greets you".to_string(),
            "SIZE 8388608".to_string(),
            "8BITMIME".to_string(),
        ]);
        let rendered = r.render(true, &shared);
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap(), "250-mail.example.com greets you\r");
        assert_eq!(lines.next().unwrap(), "250-SIZE 8388608\r");
        assert_eq!(lines.next().unwrap(), "250 8BITMIME\r");
    }

    #[test]
    fn non_esmtp_client_always_gets_single_line() {
        let shared = state();
        let r = Response::new(250, "short form", Action::Ok)
            .with_multi_line(vec!["short form".to_string(), "SIZE 1".to_string()]);
        assert_eq!(r.render(false, &shared), "250 short form\r\n");
    }

    #[test]
    fn templates_are_substituted() {
        let shared = state();
        let r = Response::new(
            220,
            "<server_name> ready for <client.advertised_name> at <client.ip>:<client.port>",
            Action::Ok,
        );
        assert_eq!(
            r.render(true, &shared),
            "220 mail.example.com ready for [127.0.0.1:2525] at 127.0.0.1:2525\r\n"
        );
    }
}
