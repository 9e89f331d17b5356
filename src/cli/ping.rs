use clap::Args;

use crate::common::error;
use crate::config::Config;
use crate::{KvFacade, Result};

/// Ping to store
#[derive(Args, Debug)]
pub struct PingCommand {
    /// Ping counts
    #[arg(long, short = 'c', default_value_t = 1)]
    count: u64,
}

impl PingCommand {
    pub async fn run(self, config: &Config) -> Result<()> {
        let kv = KvFacade::connect(config).await?;

        for current in 1..=self.count {
            let latency = kv.ping().await.map_err(|err| {
                error!(%err, "Ping failed");
                err
            })?;
            println!(
                "ping (latency {}ms) {}/{}",
                latency.num_milliseconds(),
                current,
                self.count
            );
        }

        Ok(())
    }
}
