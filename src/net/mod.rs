//! Transport and line-buffering primitives shared by the protocol engine.

pub mod line_socket;
pub mod transport;

pub use line_socket::{LineSocket, LineSocketError};
pub use transport::Transport;
