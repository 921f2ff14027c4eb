use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::errors::Result;
use crate::query::AdvancedQuery;

/// Library instances, optionally limited to classes whose name starts with a
/// match of `library` (a regular expression).
#[derive(Debug, Clone, Default)]
pub struct LibraryQuery {
    pub library: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LibraryRow {
    pub library_class: String,
    pub path: String,
}

impl LibraryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn library(pattern: impl Into<String>) -> Self {
        Self {
            library: Some(pattern.into()),
        }
    }
}

pub(crate) async fn library_instances(conn: &mut SqliteConnection) -> Result<Vec<LibraryRow>> {
    let rows = sqlx::query_as::<_, LibraryRow>(
        "SELECT library_class, path FROM inf
         WHERE library_class IS NOT NULL AND library_class != ''
         ORDER BY library_class, path",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[async_trait]
impl AdvancedQuery for LibraryQuery {
    type Row = LibraryRow;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<LibraryRow>> {
        let pattern = match &self.library {
            Some(library) => Some(Regex::new(&format!("^(?:{library})"))?),
            None => None,
        };

        let rows = library_instances(conn).await?;
        Ok(rows
            .into_iter()
            .filter(|row| pattern.as_ref().is_none_or(|re| re.is_match(&row.library_class)))
            .collect())
    }
}
