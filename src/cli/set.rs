use std::time::Duration;

use clap::Args;

use crate::cli::parse_value;
use crate::{KvFacade, Result};

/// Set key value
#[derive(Args, Debug)]
pub struct SetCommand {
    /// Key
    pub key: String,
    /// Value, stored as a JSON string unless it parses as JSON
    pub value: String,
    /// Expire after seconds, no expiration when omitted
    #[arg(long)]
    pub ttl_seconds: Option<u64>,
}

impl SetCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        let ttl = self.ttl_seconds.map(Duration::from_secs);

        kv.set(&self.key, &parse_value(&self.value), ttl).await?;

        println!("OK");

        Ok(())
    }
}
