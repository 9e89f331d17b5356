mod store;
pub use store::{StoreError, StoreErrorKind};

use std::error;
use std::fmt;

/// Location of the value an operation touched.
///
/// `field` is set for hash table operations and `entity` names the table,
/// otherwise `entity` is the scalar key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub entity: String,
    pub field: Option<String>,
}

impl Target {
    pub fn key(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: None,
        }
    }

    pub fn field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "entity: {}, field: {}", self.entity, field),
            None => write!(f, "key: {}", self.entity),
        }
    }
}

#[derive(Debug)]
pub enum KvjsonError {
    // Connecting, probing or using a facade that was never connected.
    Connection {
        target: String,
        cause: Option<StoreError>,
    },
    // Absent value, or the store failed while reading it.
    NotFound {
        target: Target,
        cause: Option<StoreError>,
    },
    // Stored payload is not valid JSON for the requested type.
    Decode {
        target: Target,
        raw: String,
        cause: serde_json::Error,
    },
    // Value could not be serialized. The store was not contacted.
    Encode {
        target: Target,
        cause: serde_json::Error,
    },
    Write {
        target: Target,
        cause: StoreError,
    },
    Delete {
        target: Target,
        cause: StoreError,
    },
    InvalidKey {
        target: Target,
    },
    Config {
        description: String,
    },
}

/// Fieldless mirror of [`KvjsonError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    NotFound,
    Decode,
    Encode,
    Write,
    Delete,
    InvalidKey,
    Config,
}

impl KvjsonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvjsonError::Connection { .. } => ErrorKind::Connection,
            KvjsonError::NotFound { .. } => ErrorKind::NotFound,
            KvjsonError::Decode { .. } => ErrorKind::Decode,
            KvjsonError::Encode { .. } => ErrorKind::Encode,
            KvjsonError::Write { .. } => ErrorKind::Write,
            KvjsonError::Delete { .. } => ErrorKind::Delete,
            KvjsonError::InvalidKey { .. } => ErrorKind::InvalidKey,
            KvjsonError::Config { .. } => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Store failure underneath this error, if any.
    ///
    /// A `NotFound` with a store error here was a failed read rather than a miss.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            KvjsonError::Connection { cause, .. } | KvjsonError::NotFound { cause, .. } => {
                cause.as_ref()
            }
            KvjsonError::Write { cause, .. } | KvjsonError::Delete { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub(crate) fn config(description: impl Into<String>) -> Self {
        KvjsonError::Config {
            description: description.into(),
        }
    }
}

impl fmt::Display for KvjsonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KvjsonError::Connection { target, cause } => match cause {
                Some(cause) => write!(f, "cannot connect to store {}. {}", target, cause),
                None => write!(f, "store {} is not connected", target),
            },
            KvjsonError::NotFound { target, cause } => match cause {
                Some(cause) => write!(f, "not found. {} ({})", target, cause),
                None => write!(f, "not found. {}", target),
            },
            KvjsonError::Decode { target, raw, cause } => {
                write!(
                    f,
                    "fail to unmarshal value. {}, value: {:.64} ({})",
                    target, raw, cause
                )
            }
            KvjsonError::Encode { target, cause } => {
                write!(f, "fail to marshal value. {} ({})", target, cause)
            }
            KvjsonError::Write { target, cause } => write!(f, "not stored. {} ({})", target, cause),
            KvjsonError::Delete { target, cause } => {
                write!(f, "not deleted. {} ({})", target, cause)
            }
            KvjsonError::InvalidKey { target } => write!(f, "empty key. {}", target),
            KvjsonError::Config { description } => write!(f, "configuration error. {}", description),
        }
    }
}

impl error::Error for KvjsonError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            KvjsonError::Decode { cause, .. } | KvjsonError::Encode { cause, .. } => Some(cause),
            _ => self
                .store_error()
                .map(|cause| cause as &(dyn error::Error + 'static)),
        }
    }
}

impl From<serde_yaml::Error> for KvjsonError {
    fn from(err: serde_yaml::Error) -> Self {
        KvjsonError::config(err.to_string())
    }
}

impl From<std::io::Error> for KvjsonError {
    fn from(err: std::io::Error) -> Self {
        KvjsonError::config(err.to_string())
    }
}
