use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CliError;

/// Defaults read from a TOML file. Command line flags take precedence.
///
/// ```toml
/// workspace = "/src/edk2"
/// database = "edk2.db"
/// package_paths = ["Features", "Platforms"]
/// jobs = 8
/// source_stats = true
/// source_extensions = ["*.c", "*.h"]
/// log_file = "edk2db.log"
///
/// [env]
/// TARGET = "DEBUG"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub workspace: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub package_paths: Vec<PathBuf>,
    pub jobs: Option<usize>,
    pub source_stats: bool,
    pub source_extensions: Option<Vec<String>>,
    pub log_file: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_settings() {
        let settings: Settings = toml::from_str(
            r#"
workspace = "/src/edk2"
database = "edk2.db"
package_paths = ["Features"]
jobs = 4
source_stats = true
source_extensions = ["*.c"]

[env]
TARGET = "DEBUG"
"#,
        )
        .expect("parse settings");

        assert_eq!(settings.workspace, Some(PathBuf::from("/src/edk2")));
        assert_eq!(settings.package_paths, vec![PathBuf::from("Features")]);
        assert_eq!(settings.jobs, Some(4));
        assert!(settings.source_stats);
        assert_eq!(settings.source_extensions, Some(vec!["*.c".to_string()]));
        assert_eq!(settings.env.get("TARGET").map(String::as_str), Some("DEBUG"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings = toml::from_str("").expect("parse empty settings");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Settings>("workspaces = \"typo\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("edk2db_settings_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "database = \"out.db\"\n").expect("write settings");
        let settings = load_settings(Some(&path)).expect("load settings");
        assert_eq!(settings.database, Some(PathBuf::from("out.db")));
        assert_eq!(load_settings(None).expect("defaults"), Settings::default());
    }
}
