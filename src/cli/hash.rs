use clap::Args;

use crate::cli::parse_value;
use crate::{KvFacade, Result};

/// Get a field of a hash table
#[derive(Args, Debug)]
pub struct HgetCommand {
    /// Table
    pub table: String,
    /// Field
    pub field: String,
}

impl HgetCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        let value: serde_json::Value = kv.get_hash_field(&self.table, &self.field).await?;

        println!("{}", value);

        Ok(())
    }
}

/// Get every field of a hash table
#[derive(Args, Debug)]
pub struct HgetallCommand {
    /// Table
    pub table: String,
}

impl HgetallCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        let mut fields = kv
            .get_all_hash_fields(&self.table)
            .await?
            .into_iter()
            .collect::<Vec<_>>();
        fields.sort();

        for (field, raw) in fields {
            println!("{}\t{}", field, raw);
        }

        Ok(())
    }
}

/// Set a field of a hash table
#[derive(Args, Debug)]
pub struct HsetCommand {
    /// Table
    pub table: String,
    /// Field
    pub field: String,
    /// Value, stored as a JSON string unless it parses as JSON
    pub value: String,
}

impl HsetCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        kv.set_hash_field(&self.table, &self.field, &parse_value(&self.value))
            .await?;

        println!("OK");

        Ok(())
    }
}

/// Delete a field of a hash table
#[derive(Args, Debug)]
pub struct HdelCommand {
    /// Table
    pub table: String,
    /// Field
    pub field: String,
}

impl HdelCommand {
    pub async fn run(self, kv: &KvFacade) -> Result<()> {
        kv.delete_hash_field(&self.table, &self.field).await?;

        println!("OK");

        Ok(())
    }
}
