use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::SqliteConnection;

use edk2db_core::RunId;

use crate::errors::Result;
use crate::junction;
use crate::query::AdvancedQuery;
use crate::queries::infs_in_run;
use crate::tables::{INF_TABLE, LIBRARY_KEY};

/// Components (INFs without a `LIBRARY_CLASS`) and the library classes each
/// one consumes.
///
/// `component` is a regular expression searched anywhere in the path; an
/// empty pattern matches everything. With `env_id` set, only components and associations recorded
/// by that run are reported.
#[derive(Debug, Clone, Default)]
pub struct ComponentQuery {
    pub component: String,
    pub env_id: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRow {
    pub path: String,
    pub name: Option<String>,
    pub module_type: Option<String>,
    pub libraries_used: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct ComponentRecord {
    path: String,
    name: Option<String>,
    module_type: Option<String>,
}

impl ComponentQuery {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            env_id: None,
        }
    }

    pub fn in_run(mut self, env_id: RunId) -> Self {
        self.env_id = Some(env_id);
        self
    }
}

#[async_trait]
impl AdvancedQuery for ComponentQuery {
    type Row = ComponentRow;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<ComponentRow>> {
        let pattern = Regex::new(&self.component)?;

        let records = sqlx::query_as::<_, ComponentRecord>(
            "SELECT path, base_name AS name, module_type FROM inf
             WHERE library_class IS NULL OR library_class = ''
             ORDER BY path",
        )
        .fetch_all(&mut *conn)
        .await?;

        let in_run = infs_in_run(&mut *conn, self.env_id.as_ref()).await?;

        let mut libraries: HashMap<String, Vec<String>> = HashMap::new();
        for association in
            junction::associations(&mut *conn, INF_TABLE, LIBRARY_KEY, self.env_id.as_ref()).await?
        {
            let used = libraries.entry(association.key1).or_default();
            if !used.contains(&association.key2) {
                used.push(association.key2);
            }
        }

        Ok(records
            .into_iter()
            .filter(|record| pattern.is_match(&record.path))
            .filter(|record| in_run.as_ref().is_none_or(|paths| paths.contains(&record.path)))
            .map(|record| ComponentRow {
                libraries_used: libraries.remove(&record.path).unwrap_or_default(),
                path: record.path,
                name: record.name,
                module_type: record.module_type,
            })
            .collect())
    }
}
