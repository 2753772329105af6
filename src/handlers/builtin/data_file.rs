//! Spools a message to disk (`spec.md` §4.5 "DATA handler dispatch"),
//! grounded on `rsmtpd/handlers/data_file.py`.
//!
//! Unlike the rest of the built-in handlers, this one is stateful across
//! the chunks of a single DATA phase (open file, running size, sticky
//! error), so it keeps that state in its own struct behind a `Mutex`
//! rather than in [`SharedState::extension_mut`] — the state is internal
//! bookkeeping, not something another handler should ever read.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use log::error;
use tokio::io::AsyncWriteExt;

use crate::handlers::DataCommandHandler;
use crate::response::{Action, Response};
use crate::session::SharedState;

struct Spool {
    file: Option<tokio::fs::File>,
    size: u64,
    error: bool,
}

pub struct DataFileHandler {
    spool_dir: String,
    state: Mutex<Spool>,
}

impl DataFileHandler {
    pub fn new(spool_dir: impl Into<String>) -> Self {
        DataFileHandler {
            spool_dir: spool_dir.into(),
            state: Mutex::new(Spool {
                file: None,
                size: 0,
                error: false,
            }),
        }
    }

    fn envelope(shared: &SharedState) -> String {
        let mail_from = shared
            .mail_from
            .as_ref()
            .map(|a| a.email_address.as_str())
            .unwrap_or("");
        format!(
            "Return-Path: <{}>\r\nReceived: from [{}:{}] TLS={}\r\n          with helo {}\r\n          on {} by rsmtpd\r\n",
            mail_from,
            shared.client.ip,
            shared.client.port,
            shared.client.tls_enabled,
            shared.client.advertised_name,
            Utc::now().to_rfc3339(),
        )
    }
}

#[async_trait]
impl DataCommandHandler for DataFileHandler {
    async fn handle_data(&self, chunk: &[u8], shared: &mut SharedState) {
        let mut state = self.state.lock().expect("data_file spool lock poisoned");
        if state.error {
            return;
        }

        if state.file.is_none() {
            let filename = format!("{}/rsmtpd-{}.txt", self.spool_dir, shared.transaction_id);
            match tokio::fs::File::create(&filename).await {
                Ok(mut file) => {
                    let envelope = Self::envelope(shared);
                    if let Err(e) = file.write_all(envelope.as_bytes()).await {
                        error!("Error writing envelope to {}: {}", filename, e);
                        state.error = true;
                        return;
                    }
                    shared.data_filename = Some(filename);
                    state.file = Some(file);
                }
                Err(e) => {
                    error!("Error opening spool file {}: {}", filename, e);
                    state.error = true;
                    return;
                }
            }
        }

        state.size += chunk.len() as u64;
        if state.size <= shared.max_message_size {
            if let Some(file) = state.file.as_mut() {
                if let Err(e) = file.write_all(chunk).await {
                    error!("Error writing data chunk: {}", e);
                    state.error = true;
                }
            }
        }
    }

    async fn handle_data_end(&self, shared: &mut SharedState) -> Response {
        let mut state = self.state.lock().expect("data_file spool lock poisoned");
        if let Some(mut file) = state.file.take() {
            let _ = file.flush().await;
        }

        if state.error {
            return Response::new(451, "Unable to deliver message at this time. Please try again later.", Action::Ok);
        }

        if state.size > shared.max_message_size {
            if let Some(filename) = shared.data_filename.take() {
                let _ = tokio::fs::remove_file(&filename).await;
            }
            return Response::new(
                552,
                format!(
                    "Data rejected: size of {} exceeds maximum size of {}",
                    state.size, shared.max_message_size
                ),
                Action::Close,
            );
        }

        Response::new(250, "OK", Action::Ok)
    }
}
