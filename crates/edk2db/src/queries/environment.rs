use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqliteConnection;

use edk2db_core::RunId;

use crate::errors::Result;
use crate::query::AdvancedQuery;

/// Parse runs recorded in the database, oldest first, with their
/// environment values. `id` limits the result to a single run.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentQuery {
    pub id: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentRecord {
    pub id: String,
    pub date: String,
    pub version: String,
    pub values: BTreeMap<String, String>,
}

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    id: String,
    date: String,
    version: String,
}

#[derive(sqlx::FromRow)]
struct ValueRow {
    id: String,
    key: String,
    value: Option<String>,
}

#[async_trait]
impl AdvancedQuery for EnvironmentQuery {
    type Row = EnvironmentRecord;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<EnvironmentRecord>> {
        let runs = sqlx::query_as::<_, EnvironmentRow>(
            "SELECT id, date, version FROM environment ORDER BY date, id",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut values: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for row in sqlx::query_as::<_, ValueRow>("SELECT id, key, value FROM environment_values")
            .fetch_all(&mut *conn)
            .await?
        {
            values
                .entry(row.id)
                .or_default()
                .insert(row.key, row.value.unwrap_or_default());
        }

        Ok(runs
            .into_iter()
            .filter(|run| self.id.as_ref().is_none_or(|id| id.as_str() == run.id))
            .map(|run| EnvironmentRecord {
                values: values.remove(&run.id).unwrap_or_default(),
                id: run.id,
                date: run.date,
                version: run.version,
            })
            .collect())
    }
}
