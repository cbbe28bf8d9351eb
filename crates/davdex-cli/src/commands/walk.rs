//! `davdex walk` - run a sync pass and print the listing

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use davdex_core::Config;

use crate::filter::GlobFilter;

use super::build_driver;

#[derive(Debug, Args)]
pub struct WalkCommand {
    /// Only include paths matching these globs (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    includes: Vec<String>,

    /// Exclude paths matching these globs (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

impl WalkCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let filter = Arc::new(GlobFilter::new(&self.includes, &self.excludes)?);
        let driver = build_driver(config, filter).await?;

        let listing = driver.walk().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        for stat in &listing {
            if stat.is_dir {
                println!("{}/", stat.path);
            } else {
                println!("{}\t{}\t{}", stat.path, stat.size, stat.mtime_ms);
            }
        }
        eprintln!("{} entries", listing.len());
        Ok(())
    }
}
