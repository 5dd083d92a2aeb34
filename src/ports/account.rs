use async_trait::async_trait;
use thiserror::Error;

/// Account error type
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Buying power query failed: {0}")]
    QueryError(String),
}

/// Account port trait
///
/// The engine only ever asks one question of the account boundary: how much
/// capital is deployable right now. The answer is non-negative.
#[async_trait]
pub trait AccountPort: Send + Sync {
    async fn buying_power(&self) -> Result<f64, AccountError>;
}
