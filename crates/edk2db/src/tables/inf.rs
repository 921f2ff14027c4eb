use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use edk2db_core::{BUILD_DIR, Edk2Path, find_files, normalize_path, parse_inf};

use crate::errors::Result;
use crate::generator::{ParseContext, TableGenerator};
use crate::junction;
use crate::tables::{ENVIRONMENT_TABLE, default_jobs, map_blocking};

pub const INF_TABLE: &str = "inf";
pub const SOURCE_KEY: &str = "source";
pub const LIBRARY_KEY: &str = "library";

const CREATE_INF_TABLE: &str = "
CREATE TABLE IF NOT EXISTS inf (
    path TEXT PRIMARY KEY,
    guid TEXT NOT NULL,
    base_name TEXT,
    library_class TEXT,
    package_name TEXT,
    module_type TEXT
)
";

const INSERT_INF_ROW: &str = "
INSERT OR IGNORE INTO inf (path, guid, base_name, library_class, package_name, module_type)
VALUES (?, ?, ?, ?, ?, ?)
";

/// Options for [`InfTable`].
#[derive(Debug, Clone)]
pub struct InfTableOptions {
    /// Number of blocking workers parsing INF files.
    pub jobs: usize,
}

impl Default for InfTableOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
        }
    }
}

/// Parses every INF in the workspace into one row per module.
///
/// ```text
/// inf(path PK, guid, base_name, library_class, package_name, module_type)
/// ```
///
/// Junction rows tagged with the run id link each INF to the run
/// (`environment` → `inf`), to its source files (`inf` → `source`) and to the
/// library classes it consumes (`inf` → `library`).
#[derive(Debug, Clone, Default)]
pub struct InfTable {
    options: InfTableOptions,
}

impl InfTable {
    pub fn new(options: InfTableOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug)]
struct InfEntry {
    path: String,
    guid: String,
    base_name: Option<String>,
    library_class: Option<String>,
    package_name: Option<String>,
    module_type: Option<String>,
    sources: Vec<String>,
    libraries: Vec<String>,
}

#[async_trait]
impl TableGenerator for InfTable {
    fn name(&self) -> &str {
        "inf"
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(CREATE_INF_TABLE).execute(conn).await?;
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> Result<()> {
        let workspace = Arc::new(ctx.workspace(self.name())?.clone());
        let start = Instant::now();

        let patterns = vec!["*.inf".to_string()];
        let files = find_files(workspace.workspace(), &patterns, &[BUILD_DIR])?;
        let parsed = map_blocking(files, self.options.jobs, move |file| {
            parse_entry(&workspace, file)
        })
        .await?;

        let existing: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT path FROM inf")
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

        let mut inserted = 0_usize;
        let mut seen = HashSet::new();
        for entry in parsed.into_iter().flatten() {
            // Windows driver INFs share the extension but never carry a FILE_GUID.
            if entry.guid.is_empty() {
                debug!(event = "inf_skipped", path = %entry.path, reason = "missing FILE_GUID");
                continue;
            }
            if !seen.insert(entry.path.clone()) {
                continue;
            }

            if !existing.contains(&entry.path) {
                sqlx::query(INSERT_INF_ROW)
                    .bind(&entry.path)
                    .bind(&entry.guid)
                    .bind(entry.base_name.as_deref())
                    .bind(entry.library_class.as_deref())
                    .bind(entry.package_name.as_deref())
                    .bind(entry.module_type.as_deref())
                    .execute(&mut *conn)
                    .await?;
                inserted += 1;
            }

            let run = ctx.run_id.as_str();
            junction::associate(
                &mut *conn,
                ctx.run_id,
                (ENVIRONMENT_TABLE, run),
                (INF_TABLE, &entry.path),
            )
            .await?;
            for source in &entry.sources {
                junction::associate(
                    &mut *conn,
                    ctx.run_id,
                    (INF_TABLE, &entry.path),
                    (SOURCE_KEY, source),
                )
                .await?;
            }
            for library in &entry.libraries {
                junction::associate(
                    &mut *conn,
                    ctx.run_id,
                    (INF_TABLE, &entry.path),
                    (LIBRARY_KEY, library),
                )
                .await?;
            }
        }

        debug!(
            event = "infs_parsed",
            files = seen.len(),
            inserted,
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(())
    }
}

fn parse_entry(workspace: &Edk2Path, file: PathBuf) -> Result<Option<InfEntry>> {
    let inf = parse_inf(&file)?;

    let Some(path) = workspace.relative_path_from_absolute(&file) else {
        warn!(event = "inf_outside_workspace", path = %file.display());
        return Ok(None);
    };

    let parent = file.parent().map(PathBuf::from).unwrap_or_default();
    let mut sources = Vec::new();
    for source in &inf.sources {
        let absolute = normalize_path(&parent.join(source));
        match workspace.relative_path_from_absolute(&absolute) {
            Some(relative) => sources.push(relative),
            None => warn!(event = "source_outside_workspace", inf = %path, source = %source),
        }
    }

    Ok(Some(InfEntry {
        package_name: workspace.containing_package(&file),
        guid: inf.file_guid().unwrap_or_default().to_string(),
        base_name: inf.base_name().map(str::to_string),
        module_type: inf.module_type().map(str::to_string),
        library_class: inf.library_class.clone().filter(|class| !class.is_empty()),
        libraries: inf.libraries.clone(),
        sources,
        path,
    }))
}
