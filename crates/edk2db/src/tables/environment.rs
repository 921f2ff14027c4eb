use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::SqliteConnection;

use crate::errors::Result;
use crate::generator::{ParseContext, TableGenerator};

pub const ENVIRONMENT_TABLE: &str = "environment";
pub const ENVIRONMENT_VALUES_TABLE: &str = "environment_values";
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

const CREATE_ENVIRONMENT_TABLE: &str = "
CREATE TABLE IF NOT EXISTS environment (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    version TEXT NOT NULL
)
";

const CREATE_ENVIRONMENT_VALUES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS environment_values (
    id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT,
    FOREIGN KEY (id) REFERENCES environment(id)
)
";

/// Records one row per parse run: when it happened, the `VERSION` it was run
/// for, and every other environment value.
///
/// Always executed first by [`Edk2Db::parse`](crate::Edk2Db::parse) so the
/// run identifier can be joined against rows from any other table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentTable;

#[async_trait]
impl TableGenerator for EnvironmentTable {
    fn name(&self) -> &str {
        "environment"
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(CREATE_ENVIRONMENT_TABLE)
            .execute(&mut *conn)
            .await?;
        sqlx::query(CREATE_ENVIRONMENT_VALUES_TABLE)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> Result<()> {
        let version = ctx
            .env
            .get("VERSION")
            .map(String::as_str)
            .unwrap_or(UNKNOWN_VERSION);
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query("INSERT INTO environment (id, date, version) VALUES (?, ?, ?)")
            .bind(ctx.run_id.as_str())
            .bind(&date)
            .bind(version)
            .execute(&mut *conn)
            .await?;

        for (key, value) in ctx.env.iter().filter(|(key, _)| key.as_str() != "VERSION") {
            sqlx::query("INSERT INTO environment_values (id, key, value) VALUES (?, ?, ?)")
                .bind(ctx.run_id.as_str())
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }
}
