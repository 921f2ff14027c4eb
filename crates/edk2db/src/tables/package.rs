use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use edk2db_core::{BUILD_DIR, find_files};

use crate::errors::Result;
use crate::generator::{ParseContext, TableGenerator};

pub const PACKAGE_TABLE: &str = "package";
const BASE_REPOSITORY: &str = "BASE";

const CREATE_PACKAGE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS package (
    name TEXT PRIMARY KEY,
    repository TEXT
)
";

const INSERT_PACKAGE_ROW: &str = "
INSERT OR REPLACE INTO package (name, repository)
VALUES (?, ?)
";

/// Associates every package (directory holding a `.dec`) with the git
/// repository it comes from.
///
/// The repository is the submodule name when the package lives inside a
/// submodule, otherwise the upper-cased name of the `origin` remote (or the
/// first remote), otherwise `BASE`. A workspace that is not a git checkout
/// produces no rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageTable;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Submodule {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct RepoInfo {
    remote_name: String,
    submodules: Vec<Submodule>,
}

#[async_trait]
impl TableGenerator for PackageTable {
    fn name(&self) -> &str {
        "package"
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(CREATE_PACKAGE_TABLE).execute(conn).await?;
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> Result<()> {
        let workspace = ctx.workspace(self.name())?.clone();

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<(String, String)>> {
            let root = workspace.workspace();
            let Some(repo) = inspect_repo(root) else {
                debug!(event = "package_scan_skipped", reason = "not a git repository");
                return Ok(Vec::new());
            };

            let patterns = vec!["*.dec".to_string()];
            let mut rows = Vec::new();
            for dec in find_files(root, &patterns, &[BUILD_DIR])? {
                let Some(package) = workspace.containing_package(&dec) else {
                    warn!(event = "package_unresolved", path = %dec.display());
                    continue;
                };
                let repository = repo
                    .submodules
                    .iter()
                    .find(|submodule| dec.starts_with(root.join(&submodule.path)))
                    .map(|submodule| submodule.name.clone())
                    .unwrap_or_else(|| repo.remote_name.clone());
                rows.push((package, repository));
            }
            Ok(rows)
        })
        .await??;

        for (name, repository) in &rows {
            sqlx::query(INSERT_PACKAGE_ROW)
                .bind(name)
                .bind(repository)
                .execute(&mut *conn)
                .await?;
        }

        debug!(event = "packages_recorded", packages = rows.len());
        Ok(())
    }
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(root).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn inspect_repo(root: &Path) -> Option<RepoInfo> {
    let inside = git(root, &["rev-parse", "--is-inside-work-tree"])?;
    if inside != "true" {
        return None;
    }

    let remotes = git(root, &["remote"]).unwrap_or_default();
    let remote = remotes
        .lines()
        .find(|remote| *remote == "origin")
        .or_else(|| remotes.lines().next());
    let remote_name = remote
        .and_then(|remote| git(root, &["remote", "get-url", remote]))
        .map(|url| repository_name(&url))
        .unwrap_or_else(|| BASE_REPOSITORY.to_string());

    let submodules = git(
        root,
        &["config", "--file", ".gitmodules", "--get-regexp", r"^submodule\..*\.path$"],
    )
    .map(|listing| parse_submodules(&listing))
    .unwrap_or_default();

    Some(RepoInfo {
        remote_name,
        submodules,
    })
}

/// Upper-cased last URL segment with any `.git` suffix removed.
fn repository_name(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(url);
    let name = last.split(".git").next().unwrap_or(last);
    name.to_uppercase()
}

/// Parse `git config --get-regexp` output of the form
/// `submodule.<name>.path <path>`.
fn parse_submodules(listing: &str) -> Vec<Submodule> {
    listing
        .lines()
        .filter_map(|line| {
            let (key, path) = line.split_once(char::is_whitespace)?;
            let name = key.strip_prefix("submodule.")?.strip_suffix(".path")?;
            Some(Submodule {
                name: name.to_string(),
                path: PathBuf::from(path.trim()),
            })
        })
        .collect()
}
