use clap::Args;

use crate::{KvFacade, Result};

/// Delete value
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Key
    pub key: String,
}

impl DeleteCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        kv.delete(&self.key).await?;

        println!("OK");

        Ok(())
    }
}
