// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the purge log and replication checkpoints.
use std::num::TryFromIntError;
use std::sync::Arc;

use purgelog_core::{HashError, SeqNum};
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, migrate};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Create SQLite database if it doesn't already exist.
pub async fn create_database(url: &str) -> Result<(), SqliteError> {
    if !Sqlite::database_exists(url).await? {
        Sqlite::create_database(url).await?
    }
    Ok(())
}

/// Get migrations from folder without running them.
pub fn migrations() -> Migrator {
    migrate!()
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &sqlx::SqlitePool) -> Result<(), SqliteError> {
    migrations().run(pool).await?;
    Ok(())
}

#[derive(Debug)]
pub struct SqliteStoreBuilder {
    url: String,
    max_connections: u32,
    run_migrations: bool,
    create_database: bool,
}

impl Default for SqliteStoreBuilder {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 16,
            create_database: true,
            run_migrations: true,
        }
    }
}

impl SqliteStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random_memory_url(mut self) -> Self {
        // Combining Rust tests with in-memory databases can lead to unsound behaviour, this
        // "workaround" assigns every temporary database a different, random name and keeps them
        // isolated from other tests.
        //
        // See related issue: https://github.com/launchbadge/sqlx/issues/2510
        self.url = format!(
            "sqlite://purgelog{}?mode=memory&cache=private",
            rand::random::<u32>()
        );
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_database(mut self, create_database: bool) -> Self {
        self.create_database = create_database;
        self
    }

    pub fn run_default_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    pub async fn build<'a>(self) -> Result<SqliteStore<'a>, SqliteError> {
        if self.create_database {
            create_database(&self.url).await?;
        }

        let pool: sqlx::SqlitePool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await?;

        if self.run_migrations {
            run_pending_migrations(&pool).await?;
        }

        Ok(SqliteStore::new(pool))
    }
}

pub type Transaction<'a> = sqlx::Transaction<'a, Sqlite>;

/// SQLite database with connection pool and transaction provider.
///
/// This struct can be cloned and used in multiple places in the application. Every cloned instance
/// re-uses the same connection pool and has access to the same transaction instance if one was
/// started.
///
/// SQLite strictly serializes transactions with _writes_. Appending purge events and upserting
/// checkpoints therefore happens within a transaction acquired through `begin`, which also makes
/// the AUTOINCREMENT sequence of the purge log the single point where positions are handed out.
/// Purge log scans and checkpoint lookups are pure reads and run directly on the pool via
/// `execute`, they only ever observe committed events.
#[derive(Clone, Debug)]
pub struct SqliteStore<'a> {
    tx: Arc<Mutex<Option<Transaction<'a>>>>,
    pool: sqlx::SqlitePool,
    semaphore: Arc<Semaphore>,
}

impl<'a> SqliteStore<'a> {
    pub(crate) fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            tx: Arc::default(),
            pool,
            // SQLite only ever allows _one_ transaction at a time, this semaphore makes the
            // behaviour explicit.
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Shortcut building an in-memory SQLite database with a randomised name for testing purposes.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        SqliteStoreBuilder::new()
            .random_memory_url()
            // Every connection to a private in-memory database sees a different database.
            .max_connections(1)
            .build()
            .await
            .expect("migrations succeeded")
    }

    /// Execute SQL query within transaction.
    ///
    /// This method will return an error when no transaction is currently given. Make sure to call
    /// `begin` before.
    ///
    /// If the query fails the user probably wants to roll back the transaction and free the
    /// permit. This is _not_ handled automatically.
    pub async fn tx<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&mut Transaction) -> Result<R, SqliteError>,
    {
        let mut tx_ref = self.tx.lock().await;
        let tx = tx_ref.as_mut().ok_or(SqliteError::TransactionMissing)?;

        f(tx).await
    }

    /// Execute SQL query directly.
    pub async fn execute<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&sqlx::SqlitePool) -> Result<R, SqliteError>,
    {
        f(&self.pool).await
    }
}

impl<'a> crate::traits::Transaction for SqliteStore<'a> {
    type Error = SqliteError;

    type Permit = TransactionPermit;

    /// Begins a transaction.
    ///
    /// Transactions are strictly serialized, this is expressed in form of a `TransactionPermit`
    /// processes need to hold when acquiring access to a new transaction. Any concurrent process
    /// calling it will await here if there's already another process holding a permit.
    async fn begin(&self) -> Result<TransactionPermit, SqliteError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SqliteError::SemaphoreClosed)?;

        // This lock only makes sure that mutable access to the transaction object is exclusive
        // _within_ a process holding the permit.
        let mut tx_ref = self.tx.lock().await;

        // A transaction can be left behind when its holder was cancelled before committing or
        // rolling back. Its permit is gone already, dropping it rolls back all uncommitted
        // changes.
        if let Some(stale) = tx_ref.take() {
            drop(stale);
        }

        let tx = self.pool.begin().await?;
        tx_ref.replace(tx);

        Ok(TransactionPermit(permit))
    }

    /// Rolls back the transaction and with that all uncommitted changes.
    ///
    /// This takes the permit and frees it after the rollback has finished.
    async fn rollback(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Err(SqliteError::TransactionMissing);
        };

        let result = tx.rollback().await.map_err(SqliteError::Sqlite);

        // Always drop the permit, both on successful rollback and error.
        drop(permit);

        result
    }

    /// Commits the transaction.
    ///
    /// This takes the permit and frees it after the commit has finished.
    async fn commit(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Err(SqliteError::TransactionMissing);
        };

        let result = tx.commit().await.map_err(SqliteError::Sqlite);

        // Always drop the permit, both on successful commit and error.
        drop(permit);

        result
    }
}

#[allow(unused)]
#[derive(Debug)]
pub struct TransactionPermit(OwnedSemaphorePermit);

/// Convert a sequence number into SQLite's signed 64-bit integer representation.
pub(crate) fn encode_seq(seq: SeqNum) -> Result<i64, SqliteError> {
    i64::try_from(seq).map_err(|err| SqliteError::Encode("seq".into(), err))
}

/// Convert a signed 64-bit integer read from SQLite back into a sequence number.
pub(crate) fn decode_seq(value: i64) -> Result<SeqNum, SqliteError> {
    SeqNum::try_from(value).map_err(|err| SqliteError::Decode("seq".into(), err.into()))
}

#[derive(Debug, Error)]
pub enum SqliteError {
    /// This is a critical error as it indicates that something is wrong with the usage of this
    /// API: Writes can only ever occur if a transaction was started _before_.
    #[error("tried to interact with inexistant transaction")]
    TransactionMissing,

    #[error("transaction semaphore was closed")]
    SemaphoreClosed,

    /// SQLite database and connection error.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),

    /// SQL table schema migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Value can not be represented in the database.
    #[error("failed encoding '{0}' value before storing to database: {1}")]
    Encode(String, TryFromIntError),

    /// Invalid, corrupted data was found in the database. This is a critical error.
    #[error("could not decode corrupted '{0}' value from database: {1}")]
    Decode(String, DecodeError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Integer(#[from] TryFromIntError),
}
