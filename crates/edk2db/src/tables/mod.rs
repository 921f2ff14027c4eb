//! Table generators shipped with edk2db.

use std::sync::Arc;

use crate::errors::Result;

mod environment;
mod inf;
mod package;
mod source;

pub use environment::{
    ENVIRONMENT_TABLE, ENVIRONMENT_VALUES_TABLE, EnvironmentTable, UNKNOWN_VERSION,
};
pub use inf::{INF_TABLE, InfTable, InfTableOptions, LIBRARY_KEY, SOURCE_KEY};
pub use package::{PACKAGE_TABLE, PackageTable};
pub use source::{
    DEFAULT_SOURCE_EXTENSIONS, LineStats, SOURCE_TABLE, SourceTable, SourceTableOptions,
    UNKNOWN_LICENSE,
};

/// Default worker count for generators that parse files in parallel.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Apply `f` to every item on up to `jobs` blocking workers, preserving the
/// input order in the output.
pub(crate) async fn map_blocking<T, R, F>(items: Vec<T>, jobs: usize, f: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R> + Send + Sync + 'static,
{
    let chunk_size = items.len().div_ceil(jobs.max(1)).max(1);
    let f = Arc::new(f);

    let mut handles = Vec::new();
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let chunk: Vec<T> = items.by_ref().take(chunk_size).collect();
        let f = Arc::clone(&f);
        handles.push(tokio::task::spawn_blocking(move || {
            chunk.into_iter().map(|item| (*f)(item)).collect::<Result<Vec<R>>>()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.extend(handle.await??);
    }
    Ok(results)
}
