use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Need not found: {0}")]
    NeedNotFound(i64),
    #[error("Offer not found: {0}")]
    OfferNotFound(i64),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(i64),
}
