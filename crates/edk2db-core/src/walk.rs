use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Recursively collect files under `root` whose name matches one of the
/// `*.ext` patterns.
///
/// Directories listed in `skip` (relative to `root`) are not entered. Symlinks
/// to files are followed; symlinked directories are not. The result is sorted
/// so callers insert rows in a stable order.
pub fn find_files(root: &Path, patterns: &[String], skip: &[&str]) -> Result<Vec<PathBuf>> {
    let extensions: Vec<&str> = patterns
        .iter()
        .map(|pattern| pattern.trim_start_matches('*').trim_start_matches('.'))
        .collect();
    let skip: Vec<PathBuf> = skip.iter().map(|dir| root.join(dir)).collect();

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|err| Error::io(&dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| Error::io(&dir, err))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|err| Error::io(&path, err))?;

            if file_type.is_dir() {
                if !skip.contains(&path) {
                    pending.push(path);
                }
            } else if file_type.is_file() && matches_extension(&path, &extensions) {
                found.push(path);
            } else if file_type.is_symlink() && matches_extension(&path, &extensions) {
                match std::fs::metadata(&path) {
                    Ok(target) if target.is_file() => found.push(path),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(event = "broken_symlink", path = %path.display(), error = %err);
                    }
                }
            }
        }
    }

    found.sort();
    Ok(found)
}

fn matches_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_build_and_filters_extensions() {
        let root = std::env::temp_dir().join(format!("edk2db_walk_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("Pkg/Sub")).unwrap();
        fs::create_dir_all(root.join("Build/X64")).unwrap();
        fs::write(root.join("Pkg/a.c"), "").unwrap();
        fs::write(root.join("Pkg/Sub/b.h"), "").unwrap();
        fs::write(root.join("Pkg/Sub/c.py"), "").unwrap();
        fs::write(root.join("Build/X64/d.c"), "").unwrap();

        let patterns = vec!["*.c".to_string(), "*.h".to_string()];
        let files = find_files(&root, &patterns, &["Build"]).unwrap();
        assert_eq!(files, vec![root.join("Pkg/Sub/b.h"), root.join("Pkg/a.c")]);
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files() {
        let root = std::env::temp_dir().join(format!("edk2db_walk_link_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("Pkg")).unwrap();
        fs::write(root.join("Pkg/a.c"), "").unwrap();
        std::os::unix::fs::symlink(root.join("Pkg/a.c"), root.join("Pkg/linked.c")).unwrap();
        std::os::unix::fs::symlink(root.join("Pkg/missing.c"), root.join("Pkg/dangling.c")).unwrap();

        let patterns = vec!["*.c".to_string()];
        let files = find_files(&root, &patterns, &[]).unwrap();
        assert_eq!(files, vec![root.join("Pkg/a.c"), root.join("Pkg/linked.c")]);
    }
}
