use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Order submission failed: {0}")]
    SubmitError(String),
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Whether the order opens a new allocation or unwinds the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderIntent {
    Open,
    Close,
}

/// An abstract order intent handed to the execution gateway.
///
/// `quantity` is required for open orders and omitted for close orders; a
/// close unwinds the gateway's entire recorded position in the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub intent: OrderIntent,
    pub quantity: Option<u64>,
}

impl OrderRequest {
    pub fn open(symbol: impl Into<String>, side: OrderSide, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            intent: OrderIntent::Open,
            quantity: Some(quantity),
        }
    }

    pub fn close(symbol: impl Into<String>, side: OrderSide) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            intent: OrderIntent::Close,
            quantity: None,
        }
    }
}

/// Gateway verdict on a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAck {
    Accepted,
    Rejected { reason: String },
}

impl OrderAck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderAck::Accepted)
    }
}

/// A fill confirmation delivered by the execution boundary.
///
/// Fills arrive asynchronously and may cover only part of the requested
/// quantity; reconciliation never transitions the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub symbol: String,
    pub filled_quantity: u64,
    pub filled_price: f64,
    pub side: OrderSide,
}

/// Execution gateway port trait
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    async fn submit(&self, order: OrderRequest) -> Result<OrderAck, ExecutionError>;

    /// Collect fill confirmations that arrived since the last drain.
    async fn drain_fills(&self) -> Vec<FillEvent>;
}
