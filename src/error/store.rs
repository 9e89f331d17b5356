use std::error;
use std::fmt;
use std::io;

use backtrace::Backtrace;
use tokio::time::error::Elapsed;

use crate::protocol::FrameError;

/// Failure reported by a [`Store`](crate::client::Store) round trip.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum StoreErrorKind {
    Io(io::Error),
    // Deadline elapsed before the store answered.
    Timeout(Elapsed),
    // Malformed bytes on the wire.
    Protocol(String),
    // Error reply sent by the store, e.g. `WRONGTYPE ...`.
    Server(String),
    // Well formed reply of an unexpected shape for the issued command.
    UnexpectedReply(String),
    ConnectionClosed,
    InvalidTarget(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            StoreErrorKind::Io(err) => err.fmt(f),
            StoreErrorKind::Timeout(_) => write!(f, "store request timed out"),
            StoreErrorKind::Protocol(description) => {
                write!(f, "protocol error. {}", description)
            }
            StoreErrorKind::Server(message) => write!(f, "store replied error. {}", message),
            StoreErrorKind::UnexpectedReply(description) => {
                write!(f, "unexpected reply. {}", description)
            }
            StoreErrorKind::ConnectionClosed => write!(f, "connection closed by peer"),
            StoreErrorKind::InvalidTarget(description) => {
                write!(f, "invalid connection target. {}", description)
            }
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::from(StoreErrorKind::Io(err))
    }
}

impl From<Elapsed> for StoreError {
    fn from(elapsed: Elapsed) -> Self {
        StoreError::from(StoreErrorKind::Timeout(elapsed))
    }
}

impl From<FrameError> for StoreError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Incomplete => {
                StoreError::from(StoreErrorKind::Protocol("incomplete frame".into()))
            }
            FrameError::Invalid(description) => {
                StoreError::from(StoreErrorKind::Protocol(description))
            }
        }
    }
}

impl From<StoreErrorKind> for StoreError {
    fn from(kind: StoreErrorKind) -> Self {
        StoreError::with_backtrace(kind)
    }
}

impl StoreError {
    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind(), StoreErrorKind::Timeout(_))
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind(), StoreErrorKind::Server(_))
    }

    pub(crate) fn unexpected_reply(description: impl Into<String>) -> Self {
        StoreError::from(StoreErrorKind::UnexpectedReply(description.into()))
    }

    pub(crate) fn invalid_target(description: impl Into<String>) -> Self {
        StoreError::from(StoreErrorKind::InvalidTarget(description.into()))
    }

    fn with_backtrace(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Backtrace::new()),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind() {
            StoreErrorKind::Io(err) => Some(err),
            StoreErrorKind::Timeout(elapsed) => Some(elapsed),
            _ => None,
        }
    }
}
