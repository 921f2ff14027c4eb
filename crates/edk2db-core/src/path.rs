//! Resolution between absolute paths and EDK2 workspace-relative paths.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Path resolver for an EDK2 workspace and its package paths.
///
/// Relative paths produced by the resolver always use `/` separators, which is
/// the form EDK2 build files use regardless of host platform.
#[derive(Debug, Clone)]
pub struct Edk2Path {
    workspace: PathBuf,
    package_paths: Vec<PathBuf>,
}

impl Edk2Path {
    /// Create a resolver for `workspace`.
    ///
    /// Package paths may be absolute, workspace relative, or relative to the
    /// current working directory (checked in that order). Any entry that does
    /// not resolve to a directory is an error.
    pub fn new<I, P>(workspace: impl AsRef<Path>, package_paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let workspace = absolutize(workspace.as_ref())?;
        if !workspace.is_dir() {
            return Err(Error::NotADirectory(workspace));
        }

        let mut resolved = Vec::new();
        for candidate in package_paths {
            let candidate = candidate.as_ref();
            let path = if candidate.is_absolute() {
                normalize_path(candidate)
            } else {
                let under_workspace = normalize_path(&workspace.join(candidate));
                if under_workspace.is_dir() {
                    under_workspace
                } else {
                    absolutize(candidate)?
                }
            };

            if !path.is_dir() {
                tracing::error!(event = "invalid_package_path", path = %path.display());
                return Err(Error::NotADirectory(path));
            }
            resolved.push(path);
        }

        Ok(Self {
            workspace,
            package_paths: resolved,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn package_paths(&self) -> &[PathBuf] {
        &self.package_paths
    }

    /// Convert an absolute path into a path relative to the closest package
    /// path, falling back to the workspace root.
    ///
    /// Returns `None` when the path lives outside both.
    pub fn relative_path_from_absolute(&self, abs: &Path) -> Option<String> {
        let abs = normalize_path(abs);

        let mut package_paths: Vec<&PathBuf> = self.package_paths.iter().collect();
        package_paths.sort_by_key(|path| std::cmp::Reverse(path.components().count()));

        for package_path in package_paths {
            if let Ok(rel) = abs.strip_prefix(package_path) {
                return Some(to_posix(rel));
            }
        }

        if let Ok(rel) = abs.strip_prefix(&self.workspace) {
            return Some(to_posix(rel));
        }

        tracing::debug!(event = "path_outside_workspace", path = %abs.display());
        None
    }

    /// Convert an EDK2 relative path into an absolute path that exists on this
    /// system, trying the workspace first and then each package path.
    pub fn absolute_path_from_relative(&self, rel: &str) -> Option<PathBuf> {
        let rel: PathBuf = rel.split(['/', '\\']).filter(|s| !s.is_empty()).collect();

        std::iter::once(&self.workspace)
            .chain(self.package_paths.iter())
            .map(|root| normalize_path(&root.join(&rel)))
            .find(|candidate| candidate.exists())
    }

    /// Name of the package (the nearest directory holding a `.dec` file) that
    /// contains `path`.
    ///
    /// The search walks upward from the path, or from its parent when it is a
    /// file, and stops at the workspace or package path root.
    pub fn containing_package(&self, path: &Path) -> Option<String> {
        let path = normalize_path(path);

        let root = if path.starts_with(&self.workspace) {
            self.workspace.as_path()
        } else {
            self.package_paths
                .iter()
                .find(|package_path| path.starts_with(package_path))?
                .as_path()
        };

        let mut dir = if path.is_dir() {
            path.as_path()
        } else {
            path.parent()?
        };

        while dir != root && dir.starts_with(root) {
            if has_dec_file(dir) {
                return dir.file_name().map(|name| name.to_string_lossy().into_owned());
            }
            dir = dir.parent()?;
        }

        None
    }
}

/// Render a relative path with `/` separators.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    let cwd = std::env::current_dir().map_err(|err| Error::io(path, err))?;
    Ok(normalize_path(&cwd.join(path)))
}

fn has_dec_file(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dec"))
    })
}
