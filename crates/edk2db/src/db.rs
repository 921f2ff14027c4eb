use std::fmt;
use std::path::Path;
use std::str::FromStr;

use futures::future::BoxFuture;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tracing::info;

use edk2db_core::{Edk2Path, Env, RunId};

use crate::errors::Result;
use crate::generator::{GeneratorRegistry, ParseContext, TableGenerator, run_generators};
use crate::junction;
use crate::query::AdvancedQuery;
use crate::session::Session;
use crate::tables::EnvironmentTable;

/// SQLite database manager for an EDK2 workspace.
///
/// Register [`TableGenerator`]s, call [`Edk2Db::parse`] to fill the database,
/// then read it back through [`Edk2Db::session`], [`Edk2Db::search`] or any
/// SQLite client. Call [`Edk2Db::close`] when done.
///
/// The database always contains a `junction` table
/// (`env, table1, key1, table2, key2`) for associations between tables, and an
/// `environment` table with one row per parse run.
pub struct Edk2Db {
    conn: SqliteConnection,
    workspace: Option<Edk2Path>,
    environment: EnvironmentTable,
    registry: GeneratorRegistry,
}

impl fmt::Debug for Edk2Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edk2Db")
            .field("workspace", &self.workspace)
            .field("generators", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Edk2Db {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>, workspace: Option<Edk2Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        info!(event = "database_opened", path = %path.as_ref().display());
        Self::connect(options, workspace).await
    }

    /// Create a private in-memory database, discarded on close.
    pub async fn open_in_memory(workspace: Option<Edk2Path>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, workspace).await
    }

    async fn connect(options: SqliteConnectOptions, workspace: Option<Edk2Path>) -> Result<Self> {
        let conn = SqliteConnection::connect_with(&options).await?;
        Ok(Self {
            conn,
            workspace,
            environment: EnvironmentTable,
            registry: GeneratorRegistry::new(),
        })
    }

    pub fn workspace(&self) -> Option<&Edk2Path> {
        self.workspace.as_ref()
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Append a generator to the registry.
    pub fn register<G: TableGenerator + 'static>(&mut self, generator: G) -> &mut Self {
        self.registry.register(generator);
        self
    }

    pub fn register_all<I>(&mut self, generators: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn TableGenerator>>,
    {
        self.registry.register_all(generators);
        self
    }

    /// Empty the registry. Data already written stays in the database.
    pub fn clear_generators(&mut self) {
        self.registry.clear();
    }

    /// Run every registered generator and return the identifier minted for
    /// this run.
    ///
    /// The environment table is always created and populated first.
    pub async fn parse(&mut self, env: &Env) -> Result<RunId> {
        let run_id = RunId::new();
        info!(
            event = "parse_started",
            run_id = %run_id,
            generators = self.registry.len()
        );

        junction::create_table(&mut self.conn).await?;

        let ctx = ParseContext::new(&run_id, env, self.workspace.as_ref());
        let generators: Vec<&dyn TableGenerator> =
            std::iter::once(&self.environment as &dyn TableGenerator)
                .chain(self.registry.iter())
                .collect();
        run_generators(&mut self.conn, &generators, &ctx).await?;

        info!(event = "parse_finished", run_id = %run_id);
        Ok(run_id)
    }

    /// Begin a transactional session. It rolls back unless committed.
    pub async fn session(&mut self) -> Result<Session<'_>> {
        Session::begin(&mut self.conn).await
    }

    /// Run `f` inside a transaction, committing when it returns `Ok` and
    /// rolling back when it returns `Err`.
    pub async fn with_session<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut SqliteConnection) -> BoxFuture<'s, Result<T>>,
    {
        let mut tx = self.conn.begin().await?;
        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// Execute a read-only query. Anything the query writes is rolled back.
    pub async fn search<Q: AdvancedQuery>(&mut self, query: &Q) -> Result<Vec<Q::Row>> {
        let mut tx = self.conn.begin().await?;
        let rows = query.run(&mut *tx).await;
        tx.rollback().await?;
        rows
    }

    /// Raw connection for ad-hoc SQL outside a session (autocommit).
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Release the connection. Work done outside sessions is already
    /// committed.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!(event = "database_closed");
        Ok(())
    }
}
