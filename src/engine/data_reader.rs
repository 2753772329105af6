//! Chunked DATA reader (`spec.md` §4.5): dot-unstuffing, terminator
//! detection, streaming to every data handler under the session's size
//! cap (the cap itself is enforced by the spool handler, not here).

use log::warn;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::handlers::DataCommandHandler;
use crate::net::{LineSocket, LineSocketError};
use crate::response::{Action, Response};
use crate::session::SharedState;

/// Drives the DATA phase to completion (or to a transport failure), one
/// line at a time. Generic over the transport the same way [`LineSocket`]
/// is, so tests can drive it with `tokio::io::duplex`.
pub async fn run<T>(
    socket: &mut LineSocket<T>,
    shared: &mut SharedState,
    data_handlers: &[std::sync::Arc<dyn DataCommandHandler>],
    max_line_length: usize,
) -> Result<Response, LineSocketError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let raw = socket.read_line(max_line_length).await?;
        let line = strip_line_ending(&raw);

        if line == b"." {
            break;
        }

        let delivered: Vec<u8> = if line.first() == Some(&b'.') {
            let mut unstuffed = line[1..].to_vec();
            unstuffed.extend_from_slice(b"\r\n");
            unstuffed
        } else {
            let mut with_ending = line.to_vec();
            with_ending.extend_from_slice(b"\r\n");
            with_ending
        };

        for handler in data_handlers {
            handler.handle_data(&delivered, shared).await;
        }
    }

    let mut response = None;
    for handler in data_handlers {
        let r = handler.handle_data_end(shared).await;
        shared.current_command.response = Some(r.clone());
        response = Some(r);
    }

    Ok(response.unwrap_or_else(|| {
        warn!("DATA chain produced no response; falling back to 451");
        Response::new(451, "Requested action aborted: local error in processing", Action::Ok)
    }))
}

/// Strips a trailing `LF` and, if present, a preceding `CR`.
fn strip_line_ending(raw: &[u8]) -> &[u8] {
    let without_lf = raw.strip_suffix(b"\n").unwrap_or(raw);
    without_lf.strip_suffix(b"\r").unwrap_or(without_lf)
}
