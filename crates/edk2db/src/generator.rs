use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, error, info};

use edk2db_core::{Edk2Path, Env, RunId};

use crate::errors::{DbError, Result};

/// Inputs shared with every generator during a single parse run.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub run_id: &'a RunId,
    pub env: &'a Env,
    workspace: Option<&'a Edk2Path>,
}

impl<'a> ParseContext<'a> {
    pub fn new(run_id: &'a RunId, env: &'a Env, workspace: Option<&'a Edk2Path>) -> Self {
        Self {
            run_id,
            env,
            workspace,
        }
    }

    /// Workspace resolver for generators that scan files.
    pub fn workspace(&self, generator: &str) -> Result<&'a Edk2Path> {
        self.workspace
            .ok_or_else(|| DbError::MissingWorkspace(generator.to_string()))
    }
}

/// A pluggable unit that declares and fills one or more tables.
///
/// `create_tables` must be idempotent. `parse` may assume that every
/// registered generator's tables exist, but not that any of them hold rows;
/// cross-table logic belongs in an [`AdvancedQuery`](crate::AdvancedQuery).
#[async_trait]
pub trait TableGenerator: Send + Sync {
    /// Label used in logs and errors.
    fn name(&self) -> &str;

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<()>;

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> Result<()>;
}

/// Ordered set of generators. Duplicates are allowed.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn TableGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: TableGenerator + 'static>(&mut self, generator: G) {
        self.generators.push(Box::new(generator));
    }

    pub fn register_all<I>(&mut self, generators: I)
    where
        I: IntoIterator<Item = Box<dyn TableGenerator>>,
    {
        self.generators.extend(generators);
    }

    /// Forget every registered generator. Persisted tables are untouched.
    pub fn clear(&mut self) {
        self.generators.clear();
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.generators.iter().map(|generator| generator.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TableGenerator> {
        self.generators.iter().map(|generator| generator.as_ref())
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Execute `generators` against `conn` in two phases.
///
/// Every table is created (one transaction, committed) before the first
/// populate step starts. Each populate step then runs in its own transaction,
/// committed when the generator returns. The first failure rolls back that
/// generator's work and stops the run; rows from earlier generators remain.
pub async fn run_generators(
    conn: &mut SqliteConnection,
    generators: &[&dyn TableGenerator],
    ctx: &ParseContext<'_>,
) -> Result<()> {
    let mut tx = conn.begin().await?;
    for generator in generators {
        generator
            .create_tables(&mut *tx)
            .await
            .map_err(|err| generator_error(*generator, err))?;
    }
    tx.commit().await?;
    info!(
        event = "tables_created",
        run_id = %ctx.run_id,
        generators = generators.len()
    );

    for generator in generators {
        let start = Instant::now();
        debug!(event = "generator_started", generator = generator.name(), run_id = %ctx.run_id);

        let mut tx = conn.begin().await?;
        if let Err(err) = generator.parse(&mut *tx, ctx).await {
            tx.rollback().await?;
            error!(
                event = "generator_failed",
                generator = generator.name(),
                run_id = %ctx.run_id,
                error = %err
            );
            return Err(generator_error(*generator, err));
        }
        tx.commit().await?;

        info!(
            event = "generator_finished",
            generator = generator.name(),
            run_id = %ctx.run_id,
            duration_ms = start.elapsed().as_millis() as u64
        );
    }

    Ok(())
}

fn generator_error(generator: &dyn TableGenerator, err: DbError) -> DbError {
    DbError::Generator {
        generator: generator.name().to_string(),
        source: Box::new(err),
    }
}
