//! Redis-backed configuration store on CONFIG_DB
//!
//! A section `interface[p2p-wlan0-1]` is stored as the hash
//! `INTERFACE|p2p-wlan0-1`. Sections without attributes carry the
//! `NULL=NULL` field, as everywhere else in CONFIG_DB.

use crate::config_db::{ConfigStore, SectionPath};
use crate::error::Result;
use crate::tables::{NULL_FIELD, TABLE_KEY_SEPARATOR};
use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{AsyncCommands, Client};
use tracing::{debug, info, instrument};

#[derive(Clone, Debug)]
enum StagedOp {
    Set(String),
    Del(String),
}

/// CONFIG_DB connection implementing [`ConfigStore`]
pub struct RedisConfigStore<C = ConnectionManager> {
    config_db: C,
    staged: Vec<StagedOp>,
}

impl RedisConfigStore {
    /// Connect to CONFIG_DB
    #[instrument]
    pub async fn new(host: &str, port: u16, db: u32) -> Result<Self> {
        let url = format!("redis://{}:{}/{}", host, port, db);
        let client = Client::open(url)?;
        let config_db = ConnectionManager::new(client).await?;

        info!(host, port, db, "Connected to CONFIG_DB");
        Ok(Self::with_connection(config_db))
    }
}

impl<C> RedisConfigStore<C> {
    /// Use an already established CONFIG_DB connection
    pub fn with_connection(config_db: C) -> Self {
        Self {
            config_db,
            staged: Vec::new(),
        }
    }

    /// Number of operations waiting for commit
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

/// CONFIG_DB key for a section, e.g. `INTERFACE|p2p-wlan0-1`
pub fn table_key(section_type: &str, name: &str) -> String {
    format!(
        "{}{}{}",
        section_type.to_ascii_uppercase(),
        TABLE_KEY_SEPARATOR,
        name
    )
}

#[async_trait]
impl<C> ConfigStore for RedisConfigStore<C>
where
    C: ConnectionLike + Send + Sync,
{
    #[instrument(skip(self))]
    async fn section_exists(&mut self, section_type: &str, name: &str) -> Result<bool> {
        let key = table_key(section_type, name);
        let exists: bool = self.config_db.exists(&key).await?;
        debug!(key, exists, "Checked CONFIG_DB section");
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn set_entry(&mut self, path: &str) -> Result<()> {
        let path = SectionPath::parse(path)?;
        self.staged
            .push(StagedOp::Set(table_key(&path.section_type, &path.name)));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_entry(&mut self, path: &str) -> Result<()> {
        let path = SectionPath::parse(path)?;
        self.staged
            .push(StagedOp::Del(table_key(&path.section_type, &path.name)));
        Ok(())
    }

    #[instrument(skip(self), fields(ops = self.staged.len()))]
    async fn commit(&mut self) -> Result<()> {
        // Staged ops are dropped even if the transaction fails
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &staged {
            match op {
                StagedOp::Set(key) => {
                    pipe.hset(key, NULL_FIELD, NULL_FIELD).ignore();
                }
                StagedOp::Del(key) => {
                    pipe.del(key).ignore();
                }
            }
        }

        let _: () = pipe.query_async(&mut self.config_db).await?;
        debug!(ops = staged.len(), "Committed CONFIG_DB changes");
        Ok(())
    }
}
