//! Core business logic: quotes, caching, batch refresh and configuration

pub mod cache;
pub mod clock;
pub mod config;
pub mod decimal;
pub mod holding;
pub mod log;
pub mod market;
pub mod quote;
pub mod refresh;

// Re-export main types for cleaner imports
pub use cache::{QUOTE_TTL, QuoteCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use holding::{HoldingId, HoldingRef, HoldingStore, PriceUpdate};
pub use market::MarketData;
pub use quote::{AssetType, FetchError, FetchOutcome, Quote, QuoteProvider};
pub use refresh::{RefreshCoordinator, RefreshReport};
