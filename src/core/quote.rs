//! Quote abstractions and core types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Instrument family. Each family has exactly one designated upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[serde(alias = "fon")]
    Fund,
    #[serde(alias = "hisse")]
    Equity,
    #[serde(alias = "altin")]
    Metal,
    #[serde(alias = "doviz")]
    Currency,
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetType::Fund => "fund",
                AssetType::Equity => "equity",
                AssetType::Metal => "metal",
                AssetType::Currency => "currency",
            }
        )
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fund" | "fon" => Ok(AssetType::Fund),
            "equity" | "hisse" => Ok(AssetType::Equity),
            "metal" | "altin" => Ok(AssetType::Metal),
            "currency" | "doviz" => Ok(AssetType::Currency),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// Why a quote could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream answered, but has no data for the instrument or field.
    #[error("no data for this code")]
    NotFound,
    /// Network failure, timeout, bad status or unparsable payload.
    #[error("temporary failure: {0}")]
    Transient(String),
    /// Missing credentials or unsupported instrument code.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        FetchError::Transient(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        FetchError::Config(reason.into())
    }

    /// Only transient failures are worth trying again on a later batch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Outcome of every provider call. Failures never escape as panics or raw errors.
pub type FetchOutcome = Result<Quote, FetchError>;

/// Normalized quote for one instrument. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    asset_type: AssetType,
    code: String,
    name: String,
    price: Decimal,
    buy_price: Option<Decimal>,
    sell_price: Option<Decimal>,
    fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a quote, rejecting non-positive prices.
    pub fn new(
        asset_type: AssetType,
        code: &str,
        name: impl Into<String>,
        price: Decimal,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, FetchError> {
        if price <= Decimal::ZERO {
            return Err(FetchError::transient(format!(
                "non-positive price {price} for {asset_type} {code}"
            )));
        }
        Ok(Quote {
            asset_type,
            code: code.to_uppercase(),
            name: name.into(),
            price,
            buy_price: None,
            sell_price: None,
            fetched_at,
        })
    }

    pub fn with_spread(mut self, buy_price: Option<Decimal>, sell_price: Option<Decimal>) -> Self {
        self.buy_price = buy_price;
        self.sell_price = sell_price;
        self
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn buy_price(&self) -> Option<Decimal> {
        self.buy_price
    }

    pub fn sell_price(&self) -> Option<Decimal> {
        self.sell_price
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// One upstream source, serving exactly one asset type.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn asset_type(&self) -> AssetType;

    /// False when the provider lacks what it needs to even attempt a fetch.
    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch_quote(&self, code: &str) -> FetchOutcome;
}
