use std::ops::{Deref, DerefMut};

use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection, SqlitePool};

use crate::error::Result;

/// A transaction that holds SQLite's write lock from its first statement.
///
/// A deferred `BEGIN` that reads before it writes cannot upgrade while another
/// connection is writing and fails with `SQLITE_BUSY` without waiting.
/// `BEGIN IMMEDIATE` queues on the busy timeout instead.
///
/// Dropping the guard without `commit` or `rollback` closes the connection,
/// which rolls the transaction back.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        match sqlx::query(statement).execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // State of the open transaction is unknown; never hand it back to the pool.
                drop(conn.detach());
                Err(e.into())
            }
        }
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken by commit or rollback, which consume the guard"),
        }
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken by commit or rollback, which consume the guard"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Write transaction dropped while open, closing its connection");
            drop(conn.detach());
        }
    }
}
