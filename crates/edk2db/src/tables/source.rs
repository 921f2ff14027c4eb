use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use sqlx::SqliteConnection;
use tracing::debug;

use edk2db_core::{BUILD_DIR, Edk2Path, find_files, to_posix};

use crate::errors::Result;
use crate::generator::{ParseContext, TableGenerator};
use crate::tables::{default_jobs, map_blocking};

pub const SOURCE_TABLE: &str = "source";
pub const UNKNOWN_LICENSE: &str = "Unknown";

const SPDX_PATTERN: &str = r"SPDX-License-Identifier:\s*(.*)$";

pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    "*.c", "*.h", "*.cpp", "*.asm", "*.s", "*.nasm", "*.masm", "*.rs",
];

const CREATE_SOURCE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS source (
    path TEXT PRIMARY KEY,
    license TEXT,
    total_lines INTEGER,
    code_lines INTEGER,
    comment_lines INTEGER,
    blank_lines INTEGER
)
";

const INSERT_SOURCE_ROW: &str = "
INSERT OR REPLACE INTO source (path, license, total_lines, code_lines, comment_lines, blank_lines)
VALUES (?, ?, ?, ?, ?, ?)
";

/// Options for [`SourceTable`].
#[derive(Debug, Clone)]
pub struct SourceTableOptions {
    /// Number of blocking workers reading files.
    pub jobs: usize,
    /// Classify lines as code, comment or blank. When off, every line
    /// counts as code.
    pub source_stats: bool,
    /// File name patterns (`*.ext`) to collect.
    pub extensions: Vec<String>,
}

impl Default for SourceTableOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            source_stats: false,
            extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Per-file line classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub total: usize,
    pub code: usize,
    pub comment: usize,
    pub blank: usize,
}

/// Scans the workspace for source files and records their SPDX license and
/// line statistics.
///
/// ```text
/// source(path PK, license, total_lines, code_lines, comment_lines, blank_lines)
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    options: SourceTableOptions,
}

impl SourceTable {
    pub fn new(options: SourceTableOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug)]
struct SourceEntry {
    path: String,
    license: String,
    stats: LineStats,
}

#[async_trait]
impl TableGenerator for SourceTable {
    fn name(&self) -> &str {
        "source"
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(CREATE_SOURCE_TABLE).execute(conn).await?;
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> Result<()> {
        let workspace = Arc::new(ctx.workspace(self.name())?.clone());
        let start = Instant::now();

        let files = find_files(workspace.workspace(), &self.options.extensions, &[BUILD_DIR])?;
        let source_stats = self.options.source_stats;
        let spdx = Regex::new(SPDX_PATTERN)?;
        let entries = map_blocking(files, self.options.jobs, move |file| {
            parse_source(&workspace, &spdx, file, source_stats)
        })
        .await?;

        debug!(
            event = "sources_parsed",
            files = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64
        );

        for entry in entries {
            sqlx::query(INSERT_SOURCE_ROW)
                .bind(&entry.path)
                .bind(&entry.license)
                .bind(entry.stats.total as i64)
                .bind(entry.stats.code as i64)
                .bind(entry.stats.comment as i64)
                .bind(entry.stats.blank as i64)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }
}

fn parse_source(
    workspace: &Edk2Path,
    spdx: &Regex,
    file: PathBuf,
    source_stats: bool,
) -> Result<SourceEntry> {
    let bytes = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&bytes);

    let path = file
        .strip_prefix(workspace.workspace())
        .map(to_posix)
        .unwrap_or_else(|_| to_posix(&file));

    let license = find_license(spdx, &text).unwrap_or_else(|| UNKNOWN_LICENSE.to_string());

    let stats = if source_stats {
        let style = CommentStyle::for_extension(
            file.extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default(),
        );
        count_lines(&text, style)
    } else {
        let total = text.lines().count();
        LineStats {
            total,
            code: total,
            ..LineStats::default()
        }
    };

    Ok(SourceEntry {
        path,
        license,
        stats,
    })
}

/// Last `SPDX-License-Identifier:` value in the text, if any.
fn find_license(spdx: &Regex, text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| spdx.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
        .last()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    /// `//` line comments and `/* */` blocks.
    CLike,
    /// `;` line comments.
    Assembly,
    /// `#` line comments.
    Hash,
}

impl CommentStyle {
    fn for_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "c" | "h" | "cpp" | "hpp" | "cc" | "rs" => CommentStyle::CLike,
            "asm" | "nasm" | "masm" | "s" => CommentStyle::Assembly,
            _ => CommentStyle::Hash,
        }
    }
}

fn count_lines(text: &str, style: CommentStyle) -> LineStats {
    let mut stats = LineStats::default();
    let mut in_block = false;

    for line in text.lines() {
        stats.total += 1;
        let line = line.trim();

        if line.is_empty() {
            stats.blank += 1;
            continue;
        }

        let is_comment = match style {
            CommentStyle::CLike => {
                if in_block {
                    if line.contains("*/") {
                        in_block = false;
                    }
                    true
                } else if line.starts_with("//") {
                    true
                } else if let Some(rest) = line.strip_prefix("/*") {
                    in_block = !rest.contains("*/");
                    true
                } else {
                    let code = line.split("//").next().unwrap_or(line);
                    if let Some(idx) = code.find("/*") {
                        in_block = !code[idx + 2..].contains("*/");
                    }
                    false
                }
            }
            CommentStyle::Assembly => line.starts_with(';'),
            CommentStyle::Hash => line.starts_with('#'),
        };

        if is_comment {
            stats.comment += 1;
        } else {
            stats.code += 1;
        }
    }

    stats
}
