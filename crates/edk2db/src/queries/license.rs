use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::errors::Result;
use crate::query::AdvancedQuery;
use crate::tables::UNKNOWN_LICENSE;

/// Source files without an SPDX license identifier.
///
/// `include` and `exclude` are regular expressions searched anywhere in the
/// path. A path is reported when it matches at least one include pattern (or
/// none are given) and no exclude pattern.
#[derive(Debug, Clone, Default)]
pub struct LicenseQuery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LicenseRow {
    pub path: String,
    pub license: String,
}

impl LicenseQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }
}

fn alternation(patterns: &[String]) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns
        .iter()
        .map(|pattern| format!("(?:{pattern})"))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(Regex::new(&joined)?))
}

#[async_trait]
impl AdvancedQuery for LicenseQuery {
    type Row = LicenseRow;

    async fn run(&self, conn: &mut SqliteConnection) -> Result<Vec<LicenseRow>> {
        let include = alternation(&self.include)?;
        let exclude = alternation(&self.exclude)?;

        let rows = sqlx::query_as::<_, LicenseRow>(
            "SELECT path, license FROM source WHERE license = ? ORDER BY path",
        )
        .bind(UNKNOWN_LICENSE)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| include.as_ref().is_none_or(|re| re.is_match(&row.path)))
            .filter(|row| !exclude.as_ref().is_some_and(|re| re.is_match(&row.path)))
            .collect())
    }
}
