pub mod audit_repo;
pub mod deposit_repo;
pub mod ledger_repo;
pub mod order_repo;
pub mod refund_repo;

use {
    crate::domain::error::PipelineError,
    sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    std::{str::FromStr, time::Duration},
};

pub type Tx<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

/// Opens the database file (creating it if missing) and applies migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, PipelineError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), PipelineError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
