//! Association table linking unique keys of two tables.

use serde::Serialize;
use sqlx::SqliteConnection;

use edk2db_core::RunId;

use crate::errors::Result;

pub const JUNCTION_TABLE: &str = "junction";

const CREATE_JUNCTION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS junction (
    env TEXT,
    table1 TEXT,
    key1 TEXT,
    table2 TEXT,
    key2 TEXT
)
";

const INSERT_JUNCTION_ROW: &str = "
INSERT INTO junction (env, table1, key1, table2, key2)
VALUES (?, ?, ?, ?, ?)
";

/// One association between `table1.key1` and `table2.key2`, recorded during
/// the run identified by `env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Association {
    pub env: String,
    pub table1: String,
    pub key1: String,
    pub table2: String,
    pub key2: String,
}

pub async fn create_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_JUNCTION_TABLE).execute(conn).await?;
    Ok(())
}

pub async fn associate(
    conn: &mut SqliteConnection,
    env: &RunId,
    (table1, key1): (&str, &str),
    (table2, key2): (&str, &str),
) -> Result<()> {
    sqlx::query(INSERT_JUNCTION_ROW)
        .bind(env.as_str())
        .bind(table1)
        .bind(key1)
        .bind(table2)
        .bind(key2)
        .execute(conn)
        .await?;
    Ok(())
}

/// Associations from `table1` to `table2`, optionally limited to one run.
pub async fn associations(
    conn: &mut SqliteConnection,
    table1: &str,
    table2: &str,
    env: Option<&RunId>,
) -> Result<Vec<Association>> {
    let rows = match env {
        Some(env) => {
            sqlx::query_as::<_, Association>(
                "SELECT env, table1, key1, table2, key2 FROM junction
                 WHERE table1 = ? AND table2 = ? AND env = ?
                 ORDER BY rowid",
            )
            .bind(table1)
            .bind(table2)
            .bind(env.as_str())
            .fetch_all(conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, Association>(
                "SELECT env, table1, key1, table2, key2 FROM junction
                 WHERE table1 = ? AND table2 = ?
                 ORDER BY rowid",
            )
            .bind(table1)
            .bind(table2)
            .fetch_all(conn)
            .await?
        }
    };
    Ok(rows)
}
