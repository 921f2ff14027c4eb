use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqliteConnection;

use edk2db_core::RunId;

use crate::errors::Result;
use crate::junction;
use crate::queries::infs_in_run;
use crate::queries::library::{LibraryRow, library_instances};
use crate::query::AdvancedQuery;
use crate::tables::{INF_TABLE, LIBRARY_KEY};

/// Library instances whose class no INF in the workspace consumes.
#[derive(Debug, Clone, Default)]
pub struct UnusedLibraryQuery {
    pub env_id: Option<RunId>,
}

#[async_trait]
impl AdvancedQuery for UnusedLibraryQuery {
    type Row = LibraryRow;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<LibraryRow>> {
        let instances = library_instances(&mut *conn).await?;
        let in_run = infs_in_run(&mut *conn, self.env_id.as_ref()).await?;

        let consumed: HashSet<String> =
            junction::associations(&mut *conn, INF_TABLE, LIBRARY_KEY, self.env_id.as_ref())
                .await?
                .into_iter()
                .map(|association| association.key2)
                .collect();

        Ok(instances
            .into_iter()
            .filter(|row| in_run.as_ref().is_none_or(|paths| paths.contains(&row.path)))
            .filter(|row| !consumed.contains(&row.library_class))
            .collect())
    }
}
