//! `davdex rebuild` and `davdex clear` - index maintenance

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use davdex_core::ports::AcceptAll;
use davdex_core::Config;

use super::build_driver;

#[derive(Debug, Args)]
pub struct RebuildCommand {}

impl RebuildCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let driver = build_driver(config, Arc::new(AcceptAll)).await?;

        info!("Rebuilding index from remote");
        let totals = driver.rebuild_index().await?;

        println!(
            "Rebuilt: {} files, {} directories",
            totals.file_count, totals.dir_count
        );
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ClearCommand {}

impl ClearCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let driver = build_driver(config, Arc::new(AcceptAll)).await?;
        driver.clear_index().await?;
        println!("Index cleared for vault '{}'", config.sync.vault);
        Ok(())
    }
}
