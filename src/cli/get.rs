use clap::Args;

use crate::{KvFacade, Result};

/// Get value
#[derive(Args, Debug)]
pub struct GetCommand {
    /// Key
    pub key: String,
}

impl GetCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        let value: serde_json::Value = kv.get(&self.key).await?;

        println!("{}", value);

        Ok(())
    }
}
