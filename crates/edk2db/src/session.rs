use std::ops::{Deref, DerefMut};

use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};

use crate::errors::Result;

/// Scoped transactional handle on the database.
///
/// Call [`Session::commit`] to persist changes. Dropping a session without
/// committing rolls it back.
pub struct Session<'c> {
    tx: Transaction<'c, Sqlite>,
}

impl<'c> Session<'c> {
    pub(crate) async fn begin(conn: &'c mut SqliteConnection) -> Result<Self> {
        let tx = conn.begin().await?;
        Ok(Self { tx })
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl Deref for Session<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}
