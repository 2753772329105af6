//! Per-session command/response transcript (`spec.md` §6 "Persisted
//! state"), grounded on `rsmtpd/handlers/transaction_log.py`. The original
//! ships three variants (command-only, response-only, combined); this
//! keeps the combined one, placed last in a verb's chain so it sees the
//! final response.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::handlers::CommandHandler;
use crate::response::Response;
use crate::session::SharedState;

pub struct TransactionLogHandler {
    log_path: String,
    file: Mutex<Option<tokio::fs::File>>,
}

impl TransactionLogHandler {
    pub fn new(log_path: impl Into<String>) -> Self {
        TransactionLogHandler {
            log_path: log_path.into(),
            file: Mutex::new(None),
        }
    }

    async fn handle_of(&self, filename: String) -> std::io::Result<tokio::fs::File> {
        OpenOptions::new().create(true).append(true).open(filename).await
    }
}

#[async_trait]
impl CommandHandler for TransactionLogHandler {
    async fn handle(
        &self,
        verb: &str,
        argument: &str,
        shared: &mut SharedState,
        previous: Option<&Response>,
    ) -> Response {
        let pass_through = previous.cloned().unwrap_or_else(|| Response::new(250, "OK", crate::response::Action::Ok));

        let needs_open = self.file.lock().expect("transaction log lock poisoned").is_none();
        if needs_open {
            let filename = format!(
                "{}/{}-{}-{}.log",
                self.log_path,
                Utc::now().format("%Y%m%dT%H%M%S"),
                shared.client.ip,
                shared.transaction_id
            );
            if let Ok(file) = self.handle_of(filename).await {
                *self.file.lock().expect("transaction log lock poisoned") = Some(file);
            }
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string();
        let buffer_state = if shared.current_command.buffer_empty { "empty" } else { "full" };
        let command_line = if argument.is_empty() {
            format!("> {timestamp} [buffer: {buffer_state}] {verb}\r\n")
        } else {
            format!("> {timestamp} [buffer: {buffer_state}] {verb} {argument}\r\n")
        };
        let response_line = format!("< {}", pass_through.render(shared.esmtp_capable, shared));

        if let Some(file) = self.file.lock().expect("transaction log lock poisoned").as_mut() {
            let _ = file.write_all(command_line.as_bytes()).await;
            let _ = file.write_all(response_line.as_bytes()).await;
            let _ = file.flush().await;
        }

        pass_through
    }
}
