use crate::core::holding::{HoldingId, HoldingRef, HoldingStore, PriceUpdate};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Stored state of one holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRecord {
    pub holding: HoldingRef,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub buy_price: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl HoldingRecord {
    /// Quantity times the last known price.
    pub fn market_value(&self) -> Option<Decimal> {
        self.price.map(|price| price * self.holding.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRecord {
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Default)]
struct Inner {
    records: HashMap<HoldingId, HoldingRecord>,
    history: HashMap<HoldingId, Vec<PriceRecord>>,
}

/// In-memory holding store, used by the CLI and in tests.
#[derive(Default)]
pub struct MemoryHoldingStore {
    inner: Mutex<Inner>,
}

impl MemoryHoldingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, holding: HoldingRef, name: Option<String>) {
        let mut inner = self.inner.lock().await;
        inner.records.insert(
            holding.id,
            HoldingRecord {
                holding,
                name,
                price: None,
                buy_price: None,
                sell_price: None,
                updated_at: None,
            },
        );
    }

    pub async fn insert_all(&self, holdings: &[HoldingRef]) {
        for holding in holdings {
            self.insert(holding.clone(), None).await;
        }
    }

    pub async fn record(&self, id: HoldingId) -> Option<HoldingRecord> {
        self.inner.lock().await.records.get(&id).cloned()
    }

    /// All records, ordered by id.
    pub async fn records(&self) -> Vec<HoldingRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner.records.values().cloned().collect();
        records.sort_by_key(|r| r.holding.id);
        records
    }

    pub async fn history(&self, id: HoldingId) -> Vec<PriceRecord> {
        self.inner
            .lock()
            .await
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl HoldingStore for MemoryHoldingStore {
    async fn update_price(&self, update: PriceUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(&update.id)
            .ok_or_else(|| anyhow!("Unknown holding id: {}", update.id))?;

        record.price = Some(update.price);
        record.buy_price = update.buy_price;
        record.sell_price = update.sell_price;
        record.updated_at = Some(update.updated_at);
        // A name given by the user is kept
        if record.name.as_deref().is_none_or(str::is_empty) {
            record.name = update.name;
        }
        debug!(id = update.id, price = %update.price, "Holding price updated");
        Ok(())
    }

    async fn append_price_history(
        &self,
        id: HoldingId,
        at: DateTime<Utc>,
        price: Decimal,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.records.contains_key(&id) {
            return Err(anyhow!("Unknown holding id: {}", id));
        }
        inner
            .history
            .entry(id)
            .or_default()
            .push(PriceRecord { at, price });
        Ok(())
    }
}
