use crate::crypto::TokenCipher;
use crate::db::schema::SQLITE_INIT;
use crate::error::BoardError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

/// Process-wide storage handle. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct BoardStorage {
    pool: SqlitePool,
    cipher: TokenCipher,
}

/// Open the pool, apply the schema and return the shared handle.
pub async fn connect(database_url: &str, cipher: TokenCipher) -> Result<BoardStorage, BoardError> {
    let in_memory = database_url.contains(":memory:");
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    // Every in-memory connection is its own database, so pin the pool to one.
    let mut pool_opts = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
    if in_memory {
        pool_opts = pool_opts.idle_timeout(None).max_lifetime(None);
    }
    let pool = pool_opts
        .connect_with(connect_opts)
        .await?;

    let storage = BoardStorage::new(pool, cipher);
    storage.init_schema().await?;
    info!(database_url, "storage ready");
    Ok(storage)
}

impl BoardStorage {
    pub fn new(pool: SqlitePool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cipher(&self) -> &TokenCipher {
        &self.cipher
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), BoardError> {
        // execute multiple statements one at a time (sqlx::query runs a single statement)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), BoardError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Drain and close the pool on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("storage closed");
    }
}
