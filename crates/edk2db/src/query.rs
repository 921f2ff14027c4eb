use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::errors::Result;

/// A read-only query that may combine several store queries with in-memory
/// join or filter logic.
///
/// Run it through [`Edk2Db::search`](crate::Edk2Db::search), which discards
/// any changes the query might make.
#[async_trait]
pub trait AdvancedQuery: Send + Sync {
    type Row: Send;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<Self::Row>>;
}
