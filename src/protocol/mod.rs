//! RESP2 wire protocol spoken to the store.

pub mod command;
pub mod connection;
pub mod frame;

pub use command::Command;
pub use connection::Connection;
pub use frame::{Frame, FrameError};

pub(crate) const DELIMITER: &[u8] = b"\r\n";

// Maximum bytes of a single bulk string, same as the redis server default.
pub const MAX_BULK_BYTES: usize = 512 * 1024 * 1024;

// Maximum elements of a single array.
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

pub const DEFAULT_PORT: u16 = 6379;
