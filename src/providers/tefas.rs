use crate::core::clock::Clock;
use crate::core::decimal::{json_decimal, looks_like_price, parse_turkish_decimal};
use crate::core::quote::{AssetType, FetchError, FetchOutcome, Quote, QuoteProvider};
use crate::providers::http::{HttpRequest, HttpTransport, RequestError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const NOT_FOUND_MARKER: &str = "bulunamadı";

const NAME_LABEL: &str = "span#MainContent_FormViewMainIndicators_LabelFund";
const NAME_HEADER: &str = "h2.main-indicators-header";
const PRICE_LABEL: &str = "span#MainContent_FormViewMainIndicators_LabelPrice";

/// Open-end fund prices scraped from the TEFAS fund analysis page.
pub struct TefasProvider {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl TefasProvider {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        TefasProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            clock,
        }
    }

    async fn fetch_from_history(&self, code: &str) -> FetchOutcome {
        let url = format!(
            "{}/api/DB/BindHistoryInfo?fontip=YAT&sfontur=&kurucukod=&fonkod={}&bastarih=&bittarih=",
            self.base_url, code
        );
        info!(%url, "Trying TEFAS history endpoint");

        let request = HttpRequest::get(url, REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .header("Referer", format!("{}/", self.base_url));
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(FetchError::transient(format!(
                "history endpoint returned HTTP {}",
                response.status
            )));
        }

        let payload: HistoryPayload = serde_json::from_str(&response.body).map_err(|e| {
            FetchError::transient(format!("failed to parse history response for {code}: {e}"))
        })?;
        let latest = payload.latest().ok_or(FetchError::NotFound)?;
        let price = latest.price().ok_or(FetchError::NotFound)?;
        if price <= Decimal::ZERO {
            return Err(FetchError::NotFound);
        }
        let name = latest
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("{code} Fonu"), str::to_string);

        Quote::new(AssetType::Fund, code, name, price, self.clock.now())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Rows(Vec<HistoryRow>),
    Wrapped { data: Vec<HistoryRow> },
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "FONUNVAN")]
    name: Option<String>,
    #[serde(rename = "FIYAT")]
    price: Option<serde_json::Value>,
    #[serde(rename = "TARIH")]
    date: Option<serde_json::Value>,
}

impl HistoryPayload {
    fn rows(&self) -> &[HistoryRow] {
        match self {
            HistoryPayload::Rows(rows) => rows,
            HistoryPayload::Wrapped { data } => data,
        }
    }

    /// Most recent row by date; the first row when no row carries a date.
    fn latest(&self) -> Option<&HistoryRow> {
        let rows = self.rows();
        rows.iter()
            .filter_map(|row| row.timestamp().map(|ts| (ts, row)))
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, row)| row)
            .or_else(|| rows.first())
    }
}

impl HistoryRow {
    fn timestamp(&self) -> Option<i64> {
        match self.date.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn price(&self) -> Option<Decimal> {
        json_decimal(self.price.as_ref()?)
    }
}

/// What the fund page yielded before numeric conversion.
#[derive(Debug, PartialEq, Eq)]
struct FundPage {
    name: String,
    price_text: String,
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::transient(format!("bad selector {css}: {e}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, css: &str) -> Result<Option<String>, FetchError> {
    Ok(document
        .select(&selector(css)?)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty()))
}

fn extract_name(document: &Html, code: &str) -> Result<String, FetchError> {
    if let Some(name) = first_text(document, NAME_LABEL)? {
        return Ok(name);
    }
    if let Some(name) = first_text(document, NAME_HEADER)? {
        return Ok(name);
    }
    match first_text(document, "title")? {
        Some(title) if title.to_lowercase().contains(NOT_FOUND_MARKER) => {
            warn!(%code, %title, "TEFAS page title says the fund was not found");
            Err(FetchError::NotFound)
        }
        Some(title) => Ok(title),
        None => Ok(format!("{code} Fonu")),
    }
}

fn extract_price_text(document: &Html) -> Result<Option<String>, FetchError> {
    if let Some(price) = first_text(document, PRICE_LABEL)? {
        return Ok(Some(price));
    }

    // First entry of the top indicator list
    let span = selector("span")?;
    let list_item = selector("li")?;
    if let Some(first_item) = document
        .select(&selector("ul.top-list")?)
        .next()
        .and_then(|list| list.select(&list_item).next())
        && let Some(price) = first_item.select(&span).next().map(element_text)
        && !price.is_empty()
    {
        return Ok(Some(price));
    }

    // A main indicator item mentioning the price or the currency
    for item in document.select(&selector("div.main-indicators li")?) {
        let text = element_text(item);
        if (text.contains("Fiyat") || text.contains("TL"))
            && let Some(price) = item.select(&span).next().map(element_text)
            && !price.is_empty()
        {
            return Ok(Some(price));
        }
    }

    // Last resort: any span that reads like a price
    Ok(document
        .select(&span)
        .map(element_text)
        .find(|text| looks_like_price(text)))
}

/// Runs the name and price fallback chains over a fund page.
fn parse_fund_page(html: &str, code: &str) -> Result<FundPage, FetchError> {
    let document = Html::parse_document(html);
    let name = extract_name(&document, code)?;
    let price_text = extract_price_text(&document)?.ok_or_else(|| {
        warn!(%code, "No price element on TEFAS page");
        FetchError::NotFound
    })?;
    Ok(FundPage { name, price_text })
}

#[async_trait]
impl QuoteProvider for TefasProvider {
    fn asset_type(&self) -> AssetType {
        AssetType::Fund
    }

    #[instrument(name = "TefasQuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> FetchOutcome {
        let code = code.trim().to_uppercase();
        let url = format!("{}/FonAnaliz.aspx?FonKod={}", self.base_url, code);
        debug!("Requesting fund page from {}", url);

        let request = HttpRequest::get(url, REQUEST_TIMEOUT).header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        );
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(RequestError::Timeout) => {
                return Err(FetchError::transient("fund page request timed out"));
            }
            Err(e) => {
                warn!(error = %e, "Fund page request failed, falling back to history endpoint");
                return self.fetch_from_history(&code).await;
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "Fund page returned an error status");
            return Err(FetchError::transient(format!(
                "fund page returned HTTP {}",
                response.status
            )));
        }

        let page = parse_fund_page(&response.body, &code)?;
        debug!(name = %page.name, price = %page.price_text, "Raw values read from fund page");
        let price = parse_turkish_decimal(&page.price_text).ok_or_else(|| {
            FetchError::transient(format!("unparsable fund price '{}'", page.price_text))
        })?;

        let quote = Quote::new(AssetType::Fund, &code, page.name, price, self.clock.now())?;
        info!(name = %quote.name(), price = %quote.price(), "Fetched fund quote");
        Ok(quote)
    }
}
