//! Advanced queries over the tables shipped in [`crate::tables`].

use std::collections::HashSet;

use sqlx::SqliteConnection;

use edk2db_core::RunId;

use crate::errors::Result;
use crate::junction;
use crate::tables::{ENVIRONMENT_TABLE, INF_TABLE};

mod component;
mod environment;
mod library;
mod license;
mod unused_library;

pub use component::{ComponentQuery, ComponentRow};
pub use environment::{EnvironmentQuery, EnvironmentRecord};
pub use library::{LibraryQuery, LibraryRow};
pub use license::{LicenseQuery, LicenseRow};
pub use unused_library::UnusedLibraryQuery;

/// INF paths recorded during run `env`, or `None` when no run filter applies.
async fn infs_in_run(
    conn: &mut SqliteConnection,
    env: Option<&RunId>,
) -> Result<Option<HashSet<String>>> {
    let Some(env) = env else {
        return Ok(None);
    };
    let paths = junction::associations(conn, ENVIRONMENT_TABLE, INF_TABLE, Some(env))
        .await?
        .into_iter()
        .map(|association| association.key2)
        .collect();
    Ok(Some(paths))
}
