//! The per-session command loop (`spec.md` §4.4), grounded on mail-laser's
//! `Server::handle_connection` for the overall accept/read/respond shape
//! and on `rsmtpd/core/worker.py` for the verb-dispatch semantics it
//! replaces.

use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, error, warn};
use tokio::net::TcpStream;

use crate::config::HandlerChainConfig;
use crate::engine::data_reader;
use crate::handlers::HandlerRegistry;
use crate::net::transport::Transport;
use crate::net::{LineSocket, LineSocketError};
use crate::response::{Action, Response};
use crate::session::SharedState;
use crate::tls::{tls_unavailable_response, TlsManager};

const OPEN: &str = "__OPEN__";
const DATA: &str = "__DATA__";
/// Sentinel for a decode failure (`spec.md` §4.4 step 1, §9 "engine emits
/// 500 and continues; it does not close"). Handled directly in `run()`
/// before dispatch so it never enters the configurable chain — routing it
/// through `__DEFAULT__` would let a reject-all default chain turn a
/// harmless decode error into a dropped connection.
const DECODE_FAILURE: &str = "__DECODE_FAILURE__";

/// The next thing the loop should do, replacing the spec's "current
/// command string (may be `__OPEN__`, `__DATA__`, a real verb, or
/// null-means-read-next)" with an explicit enum.
enum NextCommand {
    ReadLine,
    Pseudo(&'static str),
}

pub struct ProtocolEngine {
    socket: Option<LineSocket<Transport>>,
    shared: SharedState,
    registry: HandlerRegistry,
    chain_config: Arc<HandlerChainConfig>,
    tls_manager: Arc<TlsManager>,
    max_line_length: usize,
}

impl ProtocolEngine {
    pub fn new(
        stream: TcpStream,
        client_ip: IpAddr,
        client_port: u16,
        server_name: String,
        server_version: String,
        chain_config: Arc<HandlerChainConfig>,
        tls_manager: Arc<TlsManager>,
        max_message_size: u64,
        max_line_length: usize,
        spool_dir: &str,
        log_dir: &str,
    ) -> Self {
        let mut shared = SharedState::new(client_ip, client_port, server_name, server_version, tls_manager.enabled());
        shared.max_message_size = max_message_size;

        ProtocolEngine {
            socket: Some(LineSocket::new(Transport::from(stream))),
            shared,
            registry: HandlerRegistry::with_builtins(spool_dir, log_dir),
            chain_config,
            tls_manager,
            max_line_length,
        }
    }

    fn socket(&mut self) -> &mut LineSocket<Transport> {
        self.socket.as_mut().expect("socket only taken transiently during a STARTTLS swap")
    }

    /// Runs the session to completion. Returns once the connection is
    /// closed, either by the client, a handler's `Close`/`ForceClose`
    /// action, or a transport failure.
    pub async fn run(mut self) {
        let mut next = NextCommand::Pseudo(OPEN);

        loop {
            let (verb, argument) = match next {
                NextCommand::Pseudo(pseudo) => (pseudo.to_string(), String::new()),
                NextCommand::ReadLine => match self.acquire_command().await {
                    Some(command) => command,
                    None => return,
                },
            };

            if verb == DATA {
                match self.run_data_phase().await {
                    Some(response) => {
                        let keep_going = self.emit_and_act(response).await;
                        if !keep_going {
                            return;
                        }
                        next = NextCommand::ReadLine;
                    }
                    None => return,
                }
                continue;
            }

            if verb == DECODE_FAILURE {
                let response = Response::new(500, "Syntax error, command unrecognized", Action::Ok);
                let keep_going = self.emit_and_act(response).await;
                if !keep_going {
                    return;
                }
                next = NextCommand::ReadLine;
                continue;
            }

            let response = self.dispatch_command(&verb, &argument).await;
            match response.action {
                Action::Continue => {
                    let keep_going = self.emit_and_act(response).await;
                    if !keep_going {
                        return;
                    }
                    next = NextCommand::Pseudo(DATA);
                }
                _ => {
                    let keep_going = self.emit_and_act(response).await;
                    if !keep_going {
                        return;
                    }
                    next = NextCommand::ReadLine;
                }
            }
        }
    }

    /// Step 1: read a line, decode it, split verb/argument. Returns
    /// `None` on a closed transport (session ends quietly).
    async fn acquire_command(&mut self) -> Option<(String, String)> {
        let raw = match self.socket().read_line(self.max_line_length).await {
            Ok(raw) => raw,
            Err(LineSocketError::RemoteClosed) => return None,
            Err(LineSocketError::LineTooLong(limit)) => {
                warn!("Line exceeded {}-byte limit; closing session", limit);
                return None;
            }
        };

        let (content, had_standard_ending) = strip_line_ending(&raw);
        self.shared.last_command_had_standard_line_ending = had_standard_ending;

        let (is_utf8, content) = match content.strip_suffix(b" SMTPUTF8") {
            Some(rest) => (true, rest),
            None => (false, content),
        };

        let text = if is_utf8 {
            match std::str::from_utf8(content) {
                Ok(s) => s.to_string(),
                Err(_) => return Some((DECODE_FAILURE.to_string(), String::new())),
            }
        } else if content.is_ascii() {
            String::from_utf8_lossy(content).to_string()
        } else {
            return Some((DECODE_FAILURE.to_string(), String::new()));
        };

        let mut parts = text.splitn(2, ' ');
        let verb = parts.next().unwrap_or("").to_uppercase();
        let argument = parts.next().unwrap_or("").trim().to_string();
        Some((verb, argument))
    }

    /// Step 2: run the chain for a real verb (or `__DEFAULT__`/`__OPEN__`).
    async fn dispatch_command(&mut self, verb: &str, argument: &str) -> Response {
        let buffer_empty = self.socket().buffer_empty().await;
        self.shared.current_command.buffer_empty = buffer_empty;
        self.shared.current_command.response = None;

        let chain: Vec<_> = self.chain_config.chain_for(verb).to_vec();
        let mut response: Option<Response> = None;

        for entry in &chain {
            let descriptor = entry.descriptor();
            let Some(instance) = self.registry.resolve(&descriptor) else {
                error!("Unresolvable handler descriptor {:?}; skipping", descriptor);
                continue;
            };
            let Some(handler) = instance.command else {
                error!("Handler {:?} has no Command capability; skipping for verb dispatch", descriptor);
                continue;
            };
            let r = handler.handle(verb, argument, &mut self.shared, response.as_ref()).await;
            self.shared.current_command.response = Some(r.clone());
            response = Some(r);
        }

        response.unwrap_or_else(|| {
            warn!("Chain for {} produced no response; falling back to 451", verb);
            Response::new(451, "Requested action aborted: local error in processing", Action::Ok)
        })
    }

    /// Step 4/5: emit the response and carry out whatever it asks for.
    /// Returns `false` when the session should end.
    async fn emit_and_act(&mut self, response: Response) -> bool {
        if response.action == Action::ForceClose {
            return false;
        }

        self.write_response(&response).await;

        match response.action {
            Action::Close => false,
            Action::StartTls => self.upgrade_to_tls().await,
            _ => true,
        }
    }

    async fn write_response(&mut self, response: &Response) {
        let rendered = response.render(self.shared.esmtp_capable, &self.shared);
        if let Err(e) = self.socket().write(rendered.as_bytes()).await {
            debug!("Failed to write response (remote likely closed): {}", e);
        }
    }

    /// Performs the STARTTLS upgrade (`spec.md` §4.4 step 3, §9 "mid-session
    /// transport swap"). On handshake failure the session is not closed:
    /// `TlsManager::wrap` hands back a still-usable plaintext stream, so the
    /// engine rebuilds the `LineSocket` around it and emits 454 rather than
    /// ending the connection (`spec.md` §4.4 step 3, §9; matches
    /// `rsmtpd/core/tls.py`'s `TLS.start()` returning `(connection,
    /// SmtpResponse454())` on a handshake exception).
    async fn upgrade_to_tls(&mut self) -> bool {
        if self.socket().has_buffered_data() {
            warn!("Client pipelined bytes past STARTTLS; discarding and treating as a protocol error");
            self.socket().discard_buffer();
        }

        let plain = match self.socket_take_plain() {
            Some(stream) => stream,
            None => return false,
        };

        match self.tls_manager.wrap(plain).await {
            Ok((tls_stream, selected_name)) => {
                self.socket = Some(LineSocket::new(Transport::from(tls_stream)));
                self.shared.client.tls_enabled = true;
                if let Some(name) = selected_name {
                    self.shared.server_name = name;
                }
                true
            }
            Err((plain, e)) => {
                warn!("TLS handshake failed: {}", e);
                self.socket = Some(LineSocket::new(Transport::from(plain)));
                self.write_response(&tls_unavailable_response()).await;
                true
            }
        }
    }

    fn socket_take_plain(&mut self) -> Option<TcpStream> {
        let current = self.socket.take().expect("socket present outside a STARTTLS swap");
        match current.into_transport().into_plain() {
            Some(stream) => Some(stream),
            None => {
                error!("STARTTLS requested on an already-TLS session; ignoring");
                None
            }
        }
    }

    /// Step __DATA__: materialise the data-handler chain and run the
    /// reader. Returns `None` on a transport failure (session ends
    /// quietly, same as `acquire_command`).
    async fn run_data_phase(&mut self) -> Option<Response> {
        let chain: Vec<_> = self.chain_config.chain_for(DATA).to_vec();
        let mut data_handlers = Vec::new();
        for entry in &chain {
            let descriptor = entry.descriptor();
            let Some(instance) = self.registry.resolve(&descriptor) else {
                error!("Unresolvable DATA handler descriptor {:?}; skipping", descriptor);
                continue;
            };
            let Some(handler) = instance.data else {
                error!("Handler {:?} has no DataCommand capability; skipping for DATA dispatch", descriptor);
                continue;
            };
            data_handlers.push(handler);
        }

        match data_reader::run(self.socket(), &mut self.shared, &data_handlers, self.max_line_length).await {
            Ok(response) => Some(response),
            Err(LineSocketError::RemoteClosed) => None,
            Err(LineSocketError::LineTooLong(limit)) => {
                warn!("DATA line exceeded {}-byte limit; closing session", limit);
                None
            }
        }
    }
}

/// Strips a trailing `LF` and, if present, a preceding `CR`; reports
/// whether the `CR` was present (`spec.md` §3 `lastCommandHasStandardLineEnding`).
fn strip_line_ending(raw: &[u8]) -> (&[u8], bool) {
    let without_lf = raw.strip_suffix(b"\n").unwrap_or(raw);
    match without_lf.strip_suffix(b"\r") {
        Some(rest) => (rest, true),
        None => (without_lf, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn strip_line_ending_reports_standard_crlf() {
        let (content, standard) = strip_line_ending(b"HELO there\r\n");
        assert_eq!(content, b"HELO there");
        assert!(standard);
    }

    #[test]
    fn strip_line_ending_tolerates_bare_lf() {
        let (content, standard) = strip_line_ending(b"HELO there\n");
        assert_eq!(content, b"HELO there");
        assert!(!standard);
    }

    #[tokio::test]
    async fn dispatch_detects_pipelined_command_as_buffer_not_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_stream, peer) = listener.accept().await.unwrap();

        let yaml = "chains:\n  HELO:\n    - module: handlers.hello\n      class: HelloHandler\n  MAIL:\n    - module: handlers.mail\n      class: MailHandler\n";
        let chain_config = Arc::new(HandlerChainConfig::from_yaml_str(yaml).unwrap());
        let tls_manager = Arc::new(TlsManager::load_all(false, &[]));

        let mut engine = ProtocolEngine::new(
            server_stream,
            peer.ip(),
            peer.port(),
            "mail.example.com".to_string(),
            "rsmtpd/0.1.0".to_string(),
            chain_config,
            tls_manager,
            8 * 1024 * 1024,
            1024,
            "/var/tmp",
            "/var/tmp",
        );

        client.write_all(b"HELO x\r\nMAIL FROM:<a@b>\r\n").await.unwrap();

        let (verb, argument) = engine.acquire_command().await.unwrap();
        assert_eq!(verb, "HELO");
        engine.dispatch_command(&verb, &argument).await;

        let (verb, argument) = engine.acquire_command().await.unwrap();
        assert_eq!(verb, "MAIL");
        engine.dispatch_command(&verb, &argument).await;
        assert!(!engine.shared.current_command.buffer_empty);
    }
}
