//! CLI command implementations

pub mod maintenance;
pub mod status;
pub mod walk;

use std::sync::Arc;

use anyhow::{Context, Result};

use davdex_cache::{DatabasePool, SqliteFileIndex};
use davdex_core::domain::{Namespace, RemotePath};
use davdex_core::ports::Filter;
use davdex_core::Config;
use davdex_sync::SyncDriver;
use davdex_webdav::{WebdavClient, WebdavConfig};

/// Wires the full stack from configuration: client, store, driver
pub async fn build_driver(config: &Config, filter: Arc<dyn Filter>) -> Result<SyncDriver> {
    let password = std::env::var(&config.server.password_env).with_context(|| {
        format!(
            "Password environment variable {} is not set",
            config.server.password_env
        )
    })?;

    let client = WebdavClient::new(WebdavConfig {
        url: config.server.url.clone(),
        username: config.server.username.clone(),
        password,
        base_path: config.server.base_path.clone(),
    })
    .context("Invalid WebDAV server configuration")?;

    let pool = DatabasePool::new(&config.cache.db_path)
        .await
        .context("Failed to open index database")?;

    let base_dir = RemotePath::new(config.sync.remote_base_dir.clone())
        .context("Invalid remote base directory")?;
    let namespace = Namespace::new(config.sync.vault.clone(), base_dir.clone())
        .context("Invalid namespace")?;
    let index = Arc::new(SqliteFileIndex::new(pool.pool().clone(), &namespace));

    Ok(SyncDriver::new(
        Arc::new(client),
        index,
        base_dir,
        config.sync.concurrency,
        filter,
    ))
}
