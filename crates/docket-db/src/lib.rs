//! # docket-db
//!
//! PostgreSQL database layer for docket.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for compliance records, recipients,
//!   reminders, and confirmations
//! - Embedded schema migrations
//! - The dispatch claim queries (`FOR UPDATE SKIP LOCKED`) backing the
//!   reminder dispatcher
//!
//! ## Example
//!
//! ```rust,ignore
//! use docket_db::Database;
//! use docket_core::{RecordRepository, ReminderRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/docket").await?;
//!     db.migrate().await?;
//!
//!     let created = db.reminders.schedule_for_record(record_id).await?;
//!     println!("Scheduled {} reminders", created);
//!     Ok(())
//! }
//! ```

pub mod confirmations;
pub mod pool;
pub mod recipients;
pub mod records;
pub mod reminders;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use docket_core::*;

// Re-export repository implementations
pub use confirmations::PgConfirmationRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use recipients::PgRecipientRepository;
pub use records::PgRecordRepository;
pub use reminders::PgReminderRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Compliance record repository.
    pub records: PgRecordRepository,
    /// Recipient registry repository.
    pub recipients: PgRecipientRepository,
    /// Reminder scheduling repository.
    pub reminders: PgReminderRepository,
    /// Confirmation gateway repository.
    pub confirmations: PgConfirmationRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            records: PgRecordRepository::new(pool.clone()),
            recipients: PgRecipientRepository::new(pool.clone()),
            reminders: PgReminderRepository::new(pool.clone()),
            confirmations: PgConfirmationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to PostgreSQL with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
