mod common;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::SqliteConnection;

use edk2db::queries::EnvironmentQuery;
use edk2db::tables::InfTable;
use edk2db::{AdvancedQuery, DbError, Edk2Db, Env, ParseContext, TableGenerator};

type Log = Arc<Mutex<Vec<String>>>;

/// Records every phase it takes part in and inserts one row per run.
struct Recorder {
    name: String,
    log: Log,
}

impl Recorder {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
        }
    }

    fn push(&self, entry: String) {
        self.log.lock().expect("log lock").push(entry);
    }
}

#[async_trait]
impl TableGenerator for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> edk2db::Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {}_rows (run TEXT NOT NULL)",
            self.name
        ))
        .execute(conn)
        .await?;
        self.push(format!("create:{}", self.name));
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> edk2db::Result<()> {
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE '%\\_rows' ESCAPE '\\'",
        )
        .fetch_one(&mut *conn)
        .await?;
        sqlx::query(&format!("INSERT INTO {}_rows (run) VALUES (?)", self.name))
            .bind(ctx.run_id.as_str())
            .execute(&mut *conn)
            .await?;
        self.push(format!("parse:{}:{tables}", self.name));
        Ok(())
    }
}

/// Writes a row and then fails.
struct Failing;

#[async_trait]
impl TableGenerator for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> edk2db::Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS failing_rows (run TEXT NOT NULL)")
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn parse(&self, conn: &mut SqliteConnection, ctx: &ParseContext<'_>) -> edk2db::Result<()> {
        sqlx::query("INSERT INTO failing_rows (run) VALUES (?)")
            .bind(ctx.run_id.as_str())
            .execute(conn)
            .await?;
        Err(DbError::InvalidQuery("boom".to_string()))
    }
}

/// Tries to write, then counts the rows of a recorder table.
struct MutatingCount;

#[async_trait]
impl AdvancedQuery for MutatingCount {
    type Row = i64;

    async fn run(&self, conn: &mut SqliteConnection) -> edk2db::Result<Vec<i64>> {
        sqlx::query("INSERT INTO alpha_rows (run) VALUES ('query')")
            .execute(&mut *conn)
            .await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alpha_rows")
            .fetch_one(&mut *conn)
            .await?;
        Ok(vec![count])
    }
}

async fn row_count(db: &mut Edk2Db, table: &str) -> Result<i64> {
    let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.connection())
        .await
        .with_context(|| format!("counting {table}"))?;
    Ok(count)
}

#[tokio::test]
async fn creates_every_table_before_populating_in_registration_order() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log))
        .register(Recorder::new("beta", &log))
        .register(Recorder::new("gamma", &log));

    db.parse(&Env::new()).await?;

    let log = log.lock().map_err(|_| anyhow!("log lock poisoned"))?.clone();
    assert_eq!(
        log,
        vec![
            "create:alpha",
            "create:beta",
            "create:gamma",
            "parse:alpha:3",
            "parse:beta:3",
            "parse:gamma:3",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn clear_then_register_behaves_like_a_fresh_registry() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log));
    db.clear_generators();
    assert!(db.generators().is_empty());

    db.register(Recorder::new("beta", &log));
    assert_eq!(db.generators().names(), vec!["beta"]);
    db.parse(&Env::new()).await?;

    let log = log.lock().map_err(|_| anyhow!("log lock poisoned"))?.clone();
    assert_eq!(log, vec!["create:beta", "parse:beta:1"]);
    // The built-in environment generator still records the run.
    assert_eq!(row_count(&mut db, "environment").await?, 1);
    Ok(())
}

#[tokio::test]
async fn register_all_keeps_iteration_order() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    let generators: Vec<Box<dyn TableGenerator>> = vec![
        Box::new(Recorder::new("gamma", &log)),
        Box::new(Recorder::new("alpha", &log)),
    ];
    db.register_all(generators);
    assert_eq!(db.generators().names(), vec!["gamma", "alpha"]);

    db.parse(&Env::new()).await?;

    let log = log.lock().map_err(|_| anyhow!("log lock poisoned"))?.clone();
    assert_eq!(
        log,
        vec!["create:gamma", "create:alpha", "parse:gamma:2", "parse:alpha:2"]
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_registrations_run_twice() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log))
        .register(Recorder::new("alpha", &log));

    db.parse(&Env::new()).await?;

    assert_eq!(row_count(&mut db, "alpha_rows").await?, 2);
    Ok(())
}

#[tokio::test]
async fn every_parse_mints_a_distinct_run_id() -> Result<()> {
    let mut db = Edk2Db::open_in_memory(None).await?;
    let first = db.parse(&Env::new()).await?;
    let second = db.parse(&Env::new()).await?;

    assert_ne!(first, second);
    for id in [&first, &second] {
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }
    assert_eq!(row_count(&mut db, "environment").await?, 2);
    Ok(())
}

#[tokio::test]
async fn failing_generator_rolls_back_and_stops_the_run() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log))
        .register(Failing)
        .register(Recorder::new("gamma", &log));

    let err = db.parse(&Env::new()).await.unwrap_err();
    match &err {
        DbError::Generator { generator, source } => {
            assert_eq!(generator, "failing");
            assert!(matches!(**source, DbError::InvalidQuery(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("failing"));

    assert_eq!(row_count(&mut db, "alpha_rows").await?, 1);
    assert_eq!(row_count(&mut db, "failing_rows").await?, 0);
    // Tables were created in the first phase even though gamma never populated.
    assert_eq!(row_count(&mut db, "gamma_rows").await?, 0);
    let log = log.lock().map_err(|_| anyhow!("log lock poisoned"))?.clone();
    assert!(!log.iter().any(|entry| entry.starts_with("parse:gamma")));
    Ok(())
}

#[tokio::test]
async fn file_generators_require_a_workspace() -> Result<()> {
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(InfTable::default());

    let err = db.parse(&Env::new()).await.unwrap_err();
    match err {
        DbError::Generator { generator, source } => {
            assert_eq!(generator, "inf");
            assert!(matches!(*source, DbError::MissingWorkspace(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn search_never_mutates_the_store() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log));
    db.parse(&Env::new()).await?;

    let first = db.search(&MutatingCount).await?;
    let second = db.search(&MutatingCount).await?;

    assert_eq!(first, vec![2]);
    assert_eq!(first, second);
    assert_eq!(row_count(&mut db, "alpha_rows").await?, 1);
    Ok(())
}

#[tokio::test]
async fn with_session_commits_on_ok_and_rolls_back_on_err() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log));
    db.parse(&Env::new()).await?;

    db.with_session(|conn| {
        Box::pin(async move {
            sqlx::query("INSERT INTO alpha_rows (run) VALUES ('kept')")
                .execute(&mut *conn)
                .await?;
            Ok::<_, DbError>(())
        })
    })
    .await?;

    let failed = db
        .with_session(|conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO alpha_rows (run) VALUES ('dropped')")
                    .execute(&mut *conn)
                    .await?;
                Err::<(), _>(DbError::InvalidQuery("abort".to_string()))
            })
        })
        .await;
    assert!(failed.is_err());

    let runs: Vec<String> = sqlx::query_scalar("SELECT run FROM alpha_rows ORDER BY rowid")
        .fetch_all(db.connection())
        .await?;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1], "kept");
    Ok(())
}

#[tokio::test]
async fn sessions_roll_back_unless_committed() -> Result<()> {
    let log = Log::default();
    let mut db = Edk2Db::open_in_memory(None).await?;
    db.register(Recorder::new("alpha", &log));
    db.parse(&Env::new()).await?;

    let mut session = db.session().await?;
    sqlx::query("INSERT INTO alpha_rows (run) VALUES ('discarded')")
        .execute(&mut *session)
        .await?;
    drop(session);
    assert_eq!(row_count(&mut db, "alpha_rows").await?, 1);

    let mut session = db.session().await?;
    sqlx::query("INSERT INTO alpha_rows (run) VALUES ('committed')")
        .execute(session.connection())
        .await?;
    session.commit().await?;
    assert_eq!(row_count(&mut db, "alpha_rows").await?, 2);
    Ok(())
}

#[tokio::test]
async fn file_database_survives_reopen() -> Result<()> {
    let dir = common::temp_dir("reopen");
    let path = dir.join("workspace.db");

    let mut db = Edk2Db::open(&path, None).await?;
    let env = Env::from([
        ("VERSION".to_string(), "1.2.3".to_string()),
        ("TARGET".to_string(), "DEBUG".to_string()),
    ]);
    let run_id = db.parse(&env).await?;
    db.close().await?;

    let mut db = Edk2Db::open(&path, None).await?;
    let runs = db.search(&EnvironmentQuery::default()).await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run_id.as_str());
    assert_eq!(runs[0].version, "1.2.3");
    assert_eq!(runs[0].values.get("TARGET").map(String::as_str), Some("DEBUG"));
    db.close().await?;
    Ok(())
}
