use crate::core::clock::Clock;
use crate::core::decimal::parse_localized_decimal;
use crate::core::quote::{AssetType, FetchError, FetchOutcome, Quote, QuoteProvider};
use crate::providers::http::{HttpRequest, HttpTransport};
use crate::providers::xml;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SOAP_ACTION: &str = "\"http://data.altinkaynak.com/GetGold\"";
const RESULT_ELEMENT: &str = "GetGoldResult";

/// Supported metal codes and the description the feed lists them under.
const METAL_DESCRIPTIONS: [(&str, &str); 4] = [
    ("GA", "Gram Altın"),
    ("C", "Çeyrek Altın"),
    ("Y", "Yarım Altın"),
    ("T", "Teklik Altın"),
];

pub fn metal_description(code: &str) -> Option<&'static str> {
    METAL_DESCRIPTIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code.trim()))
        .map(|(_, description)| *description)
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Gold prices from the Altınkaynak SOAP data service.
pub struct AltinkaynakProvider {
    base_url: String,
    credentials: Option<Credentials>,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl AltinkaynakProvider {
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AltinkaynakProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: credentials
                .filter(|c| !c.username.trim().is_empty() && !c.password.trim().is_empty()),
            transport,
            clock,
        }
    }
}

fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

fn envelope(credentials: &Credentials) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <AuthHeader xmlns="http://data.altinkaynak.com/">
      <Username>{}</Username>
      <Password>{}</Password>
    </AuthHeader>
  </soap:Header>
  <soap:Body>
    <GetGold xmlns="http://data.altinkaynak.com/" />
  </soap:Body>
</soap:Envelope>"#,
        escape(&credentials.username),
        escape(&credentials.password)
    )
}

/// Rate for `description` from a GetGold response, as (sell, buy).
fn find_rate(
    body: &str,
    description: &str,
) -> Result<(rust_decimal::Decimal, Option<rust_decimal::Decimal>), FetchError> {
    let inner = xml::element_text(body, RESULT_ELEMENT)
        .map_err(|e| FetchError::transient(format!("bad SOAP envelope: {e}")))?
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| FetchError::transient(format!("{RESULT_ELEMENT} missing from response")))?;

    let rates = xml::records(&inner, "Kur")
        .map_err(|e| FetchError::transient(format!("bad rate document: {e}")))?;
    debug!(count = rates.len(), "Rate records in response");

    let wanted = description.to_lowercase();
    for rate in &rates {
        let Some(found) = rate.field("Aciklama") else {
            continue;
        };
        if found.trim().to_lowercase() != wanted {
            continue;
        }
        let Some(sell) = rate.field("Satis").and_then(parse_localized_decimal) else {
            warn!(description = found, sell = ?rate.field("Satis"), "Matching rate has no usable sell price");
            continue;
        };
        let buy = rate.field("Alis").and_then(parse_localized_decimal);
        return Ok((sell, buy));
    }
    Err(FetchError::NotFound)
}

#[async_trait]
impl QuoteProvider for AltinkaynakProvider {
    fn asset_type(&self) -> AssetType {
        AssetType::Metal
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    #[instrument(name = "AltinkaynakQuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> FetchOutcome {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| FetchError::config("metal service credentials are not configured"))?;
        let description = metal_description(code)
            .ok_or_else(|| FetchError::config(format!("unsupported metal code '{code}'")))?;

        let request = HttpRequest::post(
            format!("{}/DataService.asmx", self.base_url),
            envelope(credentials),
            REQUEST_TIMEOUT,
        )
        .header("Content-Type", "text/xml; charset=utf-8")
        .header("SOAPAction", SOAP_ACTION);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(FetchError::transient(format!(
                "metal service returned HTTP {}",
                response.status
            )));
        }

        let (sell, buy) = find_rate(&response.body, description)?;
        let quote = Quote::new(AssetType::Metal, code.trim(), description, sell, self.clock.now())?
            .with_spread(buy, Some(sell));
        info!(%description, price = %sell, "Fetched metal quote");
        Ok(quote)
    }
}
