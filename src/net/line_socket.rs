//! A buffered line reader/writer over an arbitrary byte transport
//! (`spec.md` §4.1). Generic over the transport type the same way
//! mail-laser's `SmtpProtocol<R, W>` is generic over its reader/writer, so
//! tests can drive it with `tokio::io::duplex` instead of a real socket.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SNI_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LineSocketError {
    #[error("remote closed the connection")]
    RemoteClosed,
    #[error("line exceeded the {0}-byte limit")]
    LineTooLong(usize),
}

/// Buffered line-oriented wrapper over a transport.
///
/// Invariant: `buffer` holds at most one partial line ahead of the
/// consumer's cursor; `read_line` never returns without a trailing `LF`
/// unless it fails.
pub struct LineSocket<T> {
    transport: T,
    buffer: Vec<u8>,
    read_size: usize,
}

impl<T> LineSocket<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: T) -> Self {
        LineSocket {
            transport,
            buffer: Vec::new(),
            read_size: 4096,
        }
    }

    /// Returns the internal buffer if non-empty, else reads up to
    /// `read_size` bytes from the transport.
    pub async fn read(&mut self) -> Result<Vec<u8>, LineSocketError> {
        if !self.buffer.is_empty() {
            return Ok(std::mem::take(&mut self.buffer));
        }

        let mut chunk = vec![0u8; self.read_size];
        let n = self
            .transport
            .read(&mut chunk)
            .await
            .map_err(|_| LineSocketError::RemoteClosed)?;
        if n == 0 {
            return Err(LineSocketError::RemoteClosed);
        }
        chunk.truncate(n);
        Ok(chunk)
    }

    /// Returns the next line up to and including the first `LF` byte (a
    /// preceding `CR`, if present, is retained).
    pub async fn read_line(&mut self, limit: usize) -> Result<Vec<u8>, LineSocketError> {
        while !self.buffer.contains(&b'\n') {
            let chunk = self.read().await?;
            self.buffer.extend_from_slice(&chunk);
            if self.buffer.len() > limit {
                return Err(LineSocketError::LineTooLong(limit));
            }
        }

        let pos = self
            .buffer
            .iter()
            .position(|&b| b == b'\n')
            .expect("loop invariant: buffer contains LF");
        Ok(self.buffer.drain(..=pos).collect())
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), LineSocketError> {
        self.transport
            .write_all(data)
            .await
            .map_err(|_| LineSocketError::RemoteClosed)?;
        self.transport
            .flush()
            .await
            .map_err(|_| LineSocketError::RemoteClosed)
    }

    /// True iff the internal buffer is empty AND no data is immediately
    /// readable within a short poll. Used to detect RFC 5321 §4.3.1
    /// pipelining violations when PIPELINING was not advertised.
    pub async fn buffer_empty(&mut self) -> bool {
        if !self.buffer.is_empty() {
            return false;
        }

        let mut probe = vec![0u8; self.read_size];
        match tokio::time::timeout(SNI_PROBE_TIMEOUT, self.transport.read(&mut probe)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => true,
            Ok(Ok(n)) => {
                probe.truncate(n);
                self.buffer.extend_from_slice(&probe);
                false
            }
        }
    }

    /// Non-polling check used right before a STARTTLS transport swap: the
    /// client must not have pipelined bytes past the STARTTLS command.
    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discards any buffered bytes, logging is the caller's responsibility
    /// (`spec.md` §9: buffered bytes at STARTTLS time are a protocol error).
    pub fn discard_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt as _};

    #[tokio::test]
    async fn read_line_returns_up_to_and_including_lf() {
        let (mut client, server) = duplex(64);
        let mut socket = LineSocket::new(server);
        client.write_all(b"HELO there\r\n").await.unwrap();
        let line = socket.read_line(1024).await.unwrap();
        assert_eq!(line, b"HELO there\r\n");
    }

    #[tokio::test]
    async fn read_line_leaves_remainder_buffered_for_next_call() {
        let (mut client, server) = duplex(64);
        let mut socket = LineSocket::new(server);
        client.write_all(b"EHLO x\r\nMAIL FROM:<a@b>\r\n").await.unwrap();
        let first = socket.read_line(1024).await.unwrap();
        assert_eq!(first, b"EHLO x\r\n");
        // Second command is already buffered: no more bytes need to be read.
        assert!(socket.has_buffered_data());
        let second = socket.read_line(1024).await.unwrap();
        assert_eq!(second, b"MAIL FROM:<a@b>\r\n");
    }

    #[tokio::test]
    async fn line_too_long_errors_without_consuming_partial_line() {
        let (mut client, server) = duplex(4096);
        let mut socket = LineSocket::new(server);
        client.write_all(&vec![b'a'; 100]).await.unwrap();
        let err = socket.read_line(10).await.unwrap_err();
        assert!(matches!(err, LineSocketError::LineTooLong(10)));
    }

    #[tokio::test]
    async fn eof_mid_line_is_remote_closed() {
        let (client, server) = duplex(64);
        let mut socket = LineSocket::new(server);
        drop(client);
        let err = socket.read_line(1024).await.unwrap_err();
        assert!(matches!(err, LineSocketError::RemoteClosed));
    }

    #[tokio::test]
    async fn buffer_empty_is_true_when_nothing_pending() {
        let (_client, server) = duplex(64);
        let mut socket = LineSocket::new(server);
        assert!(socket.buffer_empty().await);
    }

    #[tokio::test]
    async fn buffer_empty_is_false_after_pipelined_write() {
        let (mut client, server) = duplex(64);
        let mut socket = LineSocket::new(server);
        client.write_all(b"RCPT TO:<c@d>\r\n").await.unwrap();
        assert!(!socket.buffer_empty().await);
    }
}
