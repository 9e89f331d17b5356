pub mod delete;
pub mod get;
pub mod hash;
pub mod ping;
pub mod set;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::common::debug;
use crate::config::{Config, StoreTarget};
use crate::{KvFacade, KvjsonError, Result};

/// Kvjson command
#[derive(Parser, Debug)]
#[command(version, propagate_version = true, subcommand_required = true)]
pub struct KvjsonCommand {
    /// Store options
    #[command(flatten)]
    pub store: StoreOptions,
    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Store options. Flags override the configuration file.
#[derive(Args, Debug, Default)]
pub struct StoreOptions {
    /// Configuration file path
    #[arg(long, short = 'C', env = "KVJSON_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Store url (redis://[[username]:password@]host[:port][/db])
    #[arg(long, env = "KVJSON_URL", global = true, conflicts_with = "address")]
    pub url: Option<String>,
    /// Store address (host[:port])
    #[arg(long, env = "KVJSON_ADDRESS", global = true)]
    pub address: Option<String>,
    /// Store password. Applies to --address or the configured address
    #[arg(
        long,
        env = "KVJSON_CREDENTIAL",
        global = true,
        hide_env_values = true,
        conflicts_with = "url"
    )]
    pub credential: Option<String>,
    /// Logical database index. Applies to --address or the configured address
    #[arg(long, env = "KVJSON_DB_INDEX", global = true, conflicts_with = "url")]
    pub db_index: Option<u32>,
    /// Connect timeout
    #[arg(long, env = "KVJSON_CONNECT_TIMEOUT_MILLISECONDS", global = true)]
    pub connect_timeout_milliseconds: Option<u64>,
    /// Per request timeout, 0 disables it
    #[arg(long, env = "KVJSON_REQUEST_TIMEOUT_MILLISECONDS", global = true)]
    pub request_timeout_milliseconds: Option<u64>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ping
    Ping(ping::PingCommand),
    /// Get
    Get(get::GetCommand),
    /// Set
    Set(set::SetCommand),
    /// Delete
    Delete(delete::DeleteCommand),
    /// Get a hash field
    Hget(hash::HgetCommand),
    /// Get all fields of a hash
    Hgetall(hash::HgetallCommand),
    /// Set a hash field
    Hset(hash::HsetCommand),
    /// Delete a hash field
    Hdel(hash::HdelCommand),
}

/// Parse command line args
pub fn parse() -> KvjsonCommand {
    KvjsonCommand::parse()
}

impl StoreOptions {
    /// Configuration file values overridden by flags.
    pub async fn into_config(self) -> Result<Config> {
        let StoreOptions {
            config,
            url,
            address,
            credential,
            db_index,
            connect_timeout_milliseconds,
            request_timeout_milliseconds,
        } = self;

        let mut base = match config {
            Some(path) => Config::load_file(path).await?,
            None => Config::default(),
        };

        let mut flags = {
            let mut flags = Config::default();

            let address_only = credential.is_some() || db_index.is_some();
            let mut target = match (url, address) {
                (Some(_), _) if address_only => {
                    return Err(KvjsonError::config(
                        "credential and db index flags can not be combined with a url",
                    ))
                }
                (Some(url), _) => Some(StoreTarget::Url { url }),
                (None, Some(address)) => Some(StoreTarget::Address {
                    address,
                    credential,
                    db_index,
                }),
                // Refine the configured address.
                (None, None) if address_only => match base.store() {
                    StoreTarget::Address {
                        address,
                        credential: configured_credential,
                        db_index: configured_db_index,
                    } => Some(StoreTarget::Address {
                        address,
                        credential: credential.or(configured_credential),
                        db_index: db_index.or(configured_db_index),
                    }),
                    StoreTarget::Url { .. } => {
                        return Err(KvjsonError::config(
                            "credential and db index flags can not refine a configured url",
                        ))
                    }
                },
                (None, None) => None,
            };
            flags.set_store(&mut target);
            flags.set_connect_timeout_milliseconds(connect_timeout_milliseconds);
            flags.set_request_timeout_milliseconds(request_timeout_milliseconds);
            flags
        };

        base.override_merge(&mut flags);

        debug!(?base, "Configuration");

        Ok(base)
    }
}

impl KvjsonCommand {
    pub async fn run(self) -> Result<()> {
        let KvjsonCommand { store, command } = self;
        let config = store.into_config().await?;

        match command {
            Command::Ping(ping) => ping.run(&config).await,
            command => {
                let kv = KvFacade::connect(&config).await?;
                match command {
                    Command::Get(get) => get.run(&kv).await,
                    Command::Set(set) => set.run(&kv).await,
                    Command::Delete(delete) => delete.run(&kv).await,
                    Command::Hget(hget) => hget.run(&kv).await,
                    Command::Hgetall(hgetall) => hgetall.run(&kv).await,
                    Command::Hset(hset) => hset.run(&kv).await,
                    Command::Hdel(hdel) => hdel.run(&kv).await,
                    Command::Ping(_) => unreachable!(),
                }
            }
        }
    }
}

// Command line values are JSON when they parse as JSON, plain strings otherwise.
pub(crate) fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}
