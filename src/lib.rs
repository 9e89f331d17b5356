#![allow(clippy::module_inception)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod protocol;

pub use crate::error::{ErrorKind, KvjsonError, StoreError, Target};
pub type Result<T, E = crate::error::KvjsonError> = std::result::Result<T, E>;

pub use client::{MemoryStore, Store};
pub use config::{Config, StoreTarget};
pub use facade::KvFacade;

pub(crate) mod common {
    pub use tracing::{debug, error, info, trace, warn};
}
