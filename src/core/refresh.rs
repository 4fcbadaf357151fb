//! Batch refresh: one upstream call per distinct instrument, fetched in
//! parallel, applied to the store serially.

use crate::core::holding::{HoldingRef, HoldingStore, PriceUpdate};
use crate::core::market::MarketData;
use crate::core::quote::{AssetType, FetchError, FetchOutcome, Quote};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_GROUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Holdings sharing one upstream identity within a single batch.
#[derive(Debug)]
pub struct RefreshGroup<'a> {
    pub asset_type: AssetType,
    pub code: String,
    pub members: Vec<&'a HoldingRef>,
}

/// Per-holding counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RefreshReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Groups holdings by `(asset type, upper-cased code)`, in a stable order.
pub fn group_holdings(holdings: &[HoldingRef]) -> Vec<RefreshGroup<'_>> {
    let mut groups: BTreeMap<(AssetType, String), Vec<&HoldingRef>> = BTreeMap::new();
    for holding in holdings {
        groups
            .entry((holding.asset_type, holding.code.trim().to_uppercase()))
            .or_default()
            .push(holding);
    }
    groups
        .into_iter()
        .map(|((asset_type, code), members)| RefreshGroup {
            asset_type,
            code,
            members,
        })
        .collect()
}

pub struct RefreshCoordinator {
    market: Arc<MarketData>,
    store: Arc<dyn HoldingStore>,
    concurrency: usize,
    group_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(market: Arc<MarketData>, store: Arc<dyn HoldingStore>) -> Self {
        Self {
            market,
            store,
            concurrency: DEFAULT_CONCURRENCY,
            group_timeout: DEFAULT_GROUP_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_group_timeout(mut self, timeout: Duration) -> Self {
        self.group_timeout = timeout;
        self
    }

    pub async fn refresh_all(&self, holdings: &[HoldingRef]) -> RefreshReport {
        self.refresh_all_with_progress(holdings, &|| {}).await
    }

    /// Refreshes every holding. `on_group_done` fires once per fetched group.
    #[instrument(name = "RefreshAll", skip_all, fields(holdings = holdings.len()))]
    pub async fn refresh_all_with_progress(
        &self,
        holdings: &[HoldingRef],
        on_group_done: &(dyn Fn() + Send + Sync),
    ) -> RefreshReport {
        let mut report = RefreshReport::default();
        let groups = group_holdings(holdings);

        let (to_fetch, unconfigured): (Vec<_>, Vec<_>) = groups
            .into_iter()
            .partition(|group| self.market.is_configured(group.asset_type) || !self.gated(group));
        for group in &unconfigured {
            warn!(
                asset_type = %group.asset_type,
                code = %group.code,
                members = group.members.len(),
                "Provider not configured, skipping group"
            );
            report.skipped += group.members.len();
        }

        debug!(groups = to_fetch.len(), "Dispatching fetches");
        let outcomes: Vec<(RefreshGroup<'_>, FetchOutcome)> = stream::iter(to_fetch)
            .map(|group| async move {
                let outcome = self.fetch_group(&group).await;
                on_group_done();
                (group, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Single writer from here on
        for (group, outcome) in &outcomes {
            match outcome {
                Ok(quote) => {
                    for member in &group.members {
                        match self.apply(member, quote).await {
                            Ok(()) => report.succeeded += 1,
                            Err(e) => {
                                error!(id = member.id, error = ?e, "Failed to store refreshed price");
                                report.failed += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(
                        asset_type = %group.asset_type,
                        code = %group.code,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Group failed"
                    );
                    report.failed += group.members.len();
                }
            }
        }

        info!(
            total = report.total(),
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "Batch refresh finished"
        );
        report
    }

    /// Only metals carry a credential gate; any other unconfigured type is
    /// attempted and reported as a failure.
    fn gated(&self, group: &RefreshGroup<'_>) -> bool {
        group.asset_type == AssetType::Metal
    }

    async fn fetch_group(&self, group: &RefreshGroup<'_>) -> FetchOutcome {
        match tokio::time::timeout(
            self.group_timeout,
            self.market.get_quote(group.asset_type, &group.code),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::transient(format!(
                "no answer within {:?}",
                self.group_timeout
            ))),
        }
    }

    /// History goes first so a failed holding keeps its previous price.
    async fn apply(&self, holding: &HoldingRef, quote: &Quote) -> anyhow::Result<()> {
        self.store
            .append_price_history(holding.id, quote.fetched_at(), quote.price())
            .await?;
        self.store
            .update_price(PriceUpdate {
                id: holding.id,
                price: quote.price(),
                buy_price: quote.buy_price(),
                sell_price: quote.sell_price(),
                name: Some(quote.name().to_string()),
                updated_at: quote.fetched_at(),
            })
            .await
    }
}
