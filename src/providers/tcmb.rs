use crate::core::clock::Clock;
use crate::core::decimal::parse_localized_decimal;
use crate::core::quote::{AssetType, FetchError, FetchOutcome, Quote, QuoteProvider};
use crate::providers::http::{HttpRequest, HttpTransport};
use crate::providers::xml::{self, XmlRecord};
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, TimeDelta, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Business days tried, today included, before giving up.
pub const MAX_BUSINESS_DAYS: usize = 10;
const TURKEY_UTC_OFFSET_HOURS: i64 = 3;

/// Central bank indicative exchange rates against the lira.
pub struct TcmbProvider {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl TcmbProvider {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        TcmbProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock.now() + TimeDelta::hours(TURKEY_UTC_OFFSET_HOURS)).date_naive()
    }

    fn feed_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/kurlar/{}/{}.xml",
            self.base_url,
            date.format("%Y%m"),
            date.format("%d%m%Y")
        )
    }

    /// Body of the most recent published rate sheet within the search window.
    async fn latest_sheet(&self) -> Result<(NaiveDate, String), FetchError> {
        for date in business_days_back(self.today(), MAX_BUSINESS_DAYS) {
            let url = self.feed_url(date);
            match self.transport.send(HttpRequest::get(&url, REQUEST_TIMEOUT)).await {
                Ok(response) if response.is_success() => return Ok((date, response.body)),
                Ok(response) => {
                    debug!(%url, status = response.status, "No rate sheet for date");
                }
                Err(e) => {
                    warn!(%url, error = %e, "Rate sheet request failed, trying previous day");
                }
            }
        }
        Err(FetchError::transient(format!(
            "no rate sheet published in the last {MAX_BUSINESS_DAYS} business days"
        )))
    }
}

/// Weekdays from `start` backwards, `start` included when it is one.
fn business_days_back(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut date = start;
    while days.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(date);
        }
        match date.checked_sub_days(Days::new(1)) {
            Some(previous) => date = previous,
            None => break,
        }
    }
    days
}

fn matches_code(record: &XmlRecord, code: &str) -> bool {
    ["Kod", "CurrencyCode"]
        .iter()
        .filter_map(|attr| record.attribute(attr))
        .any(|value| value.trim().eq_ignore_ascii_case(code))
}

fn first_price(record: &XmlRecord, fields: [&str; 2]) -> Option<rust_decimal::Decimal> {
    fields
        .iter()
        .filter_map(|field| record.field(field))
        .find_map(parse_localized_decimal)
}

fn parse_sheet(body: &str, code: &str, clock: &dyn Clock) -> FetchOutcome {
    let currencies = xml::records(body, "Currency")
        .map_err(|e| FetchError::transient(format!("bad rate sheet: {e}")))?;
    let record = currencies
        .iter()
        .find(|record| matches_code(record, code))
        .ok_or(FetchError::NotFound)?;

    let selling = first_price(record, ["BanknoteSelling", "ForexSelling"]);
    let buying = first_price(record, ["BanknoteBuying", "ForexBuying"]);
    let price = selling
        .or(buying)
        .ok_or_else(|| FetchError::transient(format!("no selling or buying rate for {code}")))?;
    let name = record
        .field("Isim")
        .or_else(|| record.field("CurrencyName"))
        .map_or_else(|| format!("{code}/TRY"), str::to_string);

    Ok(Quote::new(AssetType::Currency, code, name, price, clock.now())?.with_spread(buying, selling))
}

#[async_trait]
impl QuoteProvider for TcmbProvider {
    fn asset_type(&self) -> AssetType {
        AssetType::Currency
    }

    #[instrument(name = "TcmbQuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> FetchOutcome {
        let code = code.trim().to_uppercase();
        let (date, body) = self.latest_sheet().await?;
        let quote = parse_sheet(&body, &code, self.clock.as_ref())?;
        info!(%date, price = %quote.price(), "Fetched currency quote");
        Ok(quote)
    }
}
