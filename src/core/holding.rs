//! Contract with the storage layer that owns holdings and their price history.

use crate::core::quote::AssetType;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type HoldingId = u64;

/// A holding as handed in by the storage layer for one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRef {
    pub id: HoldingId,
    pub asset_type: AssetType,
    pub code: String,
    pub quantity: Decimal,
}

/// Fields written back to a holding after a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub id: HoldingId,
    pub price: Decimal,
    pub buy_price: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait HoldingStore: Send + Sync {
    async fn update_price(&self, update: PriceUpdate) -> Result<()>;

    async fn append_price_history(
        &self,
        id: HoldingId,
        at: DateTime<Utc>,
        price: Decimal,
    ) -> Result<()>;
}
