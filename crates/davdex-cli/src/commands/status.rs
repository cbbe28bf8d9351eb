//! `davdex status` - show index statistics

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use davdex_core::ports::AcceptAll;
use davdex_core::Config;

use super::build_driver;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let driver = build_driver(config, Arc::new(AcceptAll)).await?;
        let stats = driver.get_index_stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("vault:       {}", config.sync.vault);
        println!("base dir:    {}", config.sync.remote_base_dir);
        println!("files:       {}", stats.file_count);
        println!("directories: {}", stats.dir_count);
        println!("indexed:     {}", if stats.has_index { "yes" } else { "no" });
        Ok(())
    }
}
