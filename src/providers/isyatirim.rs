use crate::core::clock::Clock;
use crate::core::config::Mode;
use crate::core::decimal::json_decimal;
use crate::core::quote::{AssetType, FetchError, FetchOutcome, Quote, QuoteProvider};
use crate::providers::http::{HttpRequest, HttpResponse, HttpTransport, RequestError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct IndexEntry {
    last: Option<serde_json::Value>,
    symbol: Option<String>,
}

/// Equity quotes from the İş Yatırım single-index endpoint.
pub struct IsYatirimProvider {
    base_url: String,
    mode: Mode,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl IsYatirimProvider {
    pub fn new(
        base_url: &str,
        mode: Mode,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        IsYatirimProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
            transport,
            clock,
        }
    }

    fn request(&self, code: &str) -> HttpRequest {
        let url = format!(
            "{}/tr-tr/_layouts/Isyatirim.Website/Common/Data.aspx/OneEndeks?endeks={}",
            self.base_url, code
        );
        HttpRequest::get(url, REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .header("Referer", "https://www.isyatirim.com.tr/")
    }

    /// Sends the request, retrying once without certificate validation outside production.
    async fn send(&self, code: &str) -> Result<HttpResponse, FetchError> {
        match self.transport.send(self.request(code)).await {
            Err(RequestError::Certificate(reason)) if !self.mode.is_production() => {
                warn!(%reason, "Certificate validation failed, retrying without validation");
                Ok(self.transport.send(self.request(code).insecure()).await?)
            }
            result => Ok(result?),
        }
    }
}

fn parse_entries(body: &str, code: &str, clock: &dyn Clock) -> FetchOutcome {
    let entries: Vec<IndexEntry> = serde_json::from_str(body)
        .map_err(|e| FetchError::transient(format!("failed to parse equity response: {e}")))?;
    let entry = entries.first().ok_or(FetchError::NotFound)?;

    let (Some(last), Some(symbol)) = (entry.last.as_ref(), entry.symbol.as_deref()) else {
        return Err(FetchError::NotFound);
    };
    let price = json_decimal(last)
        .ok_or_else(|| FetchError::transient(format!("unparsable equity price '{last}'")))?;

    Quote::new(AssetType::Equity, code, symbol.trim(), price, clock.now())
}

#[async_trait]
impl QuoteProvider for IsYatirimProvider {
    fn asset_type(&self) -> AssetType {
        AssetType::Equity
    }

    #[instrument(name = "IsYatirimQuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> FetchOutcome {
        let code = code.trim().to_uppercase();
        let response = self.send(&code).await?;
        if !response.is_success() {
            return Err(FetchError::transient(format!(
                "equity endpoint returned HTTP {}",
                response.status
            )));
        }
        debug!(body = %response.body, "Equity endpoint response");

        let quote = parse_entries(&response.body, &code, self.clock.as_ref())?;
        info!(price = %quote.price(), "Fetched equity quote");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::providers::http::ReqwestTransport;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Rejects every certificate-validated request, as a host with a broken chain would.
    struct BadCertificateTransport {
        inner: ReqwestTransport,
        validated_attempts: AtomicUsize,
    }

    impl BadCertificateTransport {
        fn new() -> Self {
            Self {
                inner: ReqwestTransport::new().unwrap(),
                validated_attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for BadCertificateTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
            if request.verify_tls {
                self.validated_attempts.fetch_add(1, Ordering::SeqCst);
                return Err(RequestError::Certificate(
                    "invalid peer certificate: UnknownIssuer".to_string(),
                ));
            }
            self.inner.send(request).await
        }
    }

    async fn create_mock_server(body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/tr-tr/_layouts/Isyatirim.Website/Common/Data.aspx/OneEndeks",
            ))
            .and(query_param("endeks", "THYAO"))
            .and(header("Referer", "https://www.isyatirim.com.tr/"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(uri: &str, mode: Mode, transport: Arc<dyn HttpTransport>) -> IsYatirimProvider {
        IsYatirimProvider::new(uri, mode, transport, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_successful_equity_fetch() {
        let mock_server =
            create_mock_server(r#"[{"symbol":"THYAO ","last":310.25,"volume":1}]"#, 200).await;
        let provider = provider(
            &mock_server.uri(),
            Mode::Production,
            Arc::new(ReqwestTransport::new().unwrap()),
        );

        let quote = provider.fetch_quote("thyao").await.unwrap();
        assert_eq!(quote.code(), "THYAO");
        assert_eq!(quote.name(), "THYAO");
        assert_eq!(quote.price(), Decimal::from_str("310.25").unwrap());
    }

    #[tokio::test]
    async fn test_missing_fields_are_not_found() {
        let mock_server = create_mock_server(r#"[{"symbol":"THYAO"}]"#, 200).await;
        let provider = provider(
            &mock_server.uri(),
            Mode::Production,
            Arc::new(ReqwestTransport::new().unwrap()),
        );
        assert_eq!(provider.fetch_quote("THYAO").await, Err(FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_array_is_not_found() {
        let mock_server = create_mock_server("[]", 200).await;
        let provider = provider(
            &mock_server.uri(),
            Mode::Production,
            Arc::new(ReqwestTransport::new().unwrap()),
        );
        assert_eq!(provider.fetch_quote("THYAO").await, Err(FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_bad_payload_and_status_are_transient() {
        let mock_server = create_mock_server("<html>maintenance</html>", 200).await;
        let provider = provider(
            &mock_server.uri(),
            Mode::Production,
            Arc::new(ReqwestTransport::new().unwrap()),
        );
        assert!(matches!(
            provider.fetch_quote("THYAO").await,
            Err(FetchError::Transient(_))
        ));

        let mock_server = create_mock_server("[]", 503).await;
        let provider = IsYatirimProvider::new(
            &mock_server.uri(),
            Mode::Production,
            Arc::new(ReqwestTransport::new().unwrap()),
            Arc::new(SystemClock),
        );
        assert_eq!(
            provider.fetch_quote("THYAO").await,
            Err(FetchError::transient("equity endpoint returned HTTP 503"))
        );
    }

    #[tokio::test]
    async fn test_certificate_failure_retries_without_validation_in_development() {
        let mock_server = create_mock_server(r#"[{"symbol":"THYAO","last":"310,25"}]"#, 200).await;
        let transport = Arc::new(BadCertificateTransport::new());
        let provider = provider(&mock_server.uri(), Mode::Development, transport.clone());

        let quote = provider.fetch_quote("THYAO").await.unwrap();
        assert_eq!(quote.price(), Decimal::from_str("310.25").unwrap());
        assert_eq!(transport.validated_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_certificate_failure_is_transient_in_production() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(0)
            .mount(&mock_server)
            .await;
        let transport = Arc::new(BadCertificateTransport::new());
        let provider = provider(&mock_server.uri(), Mode::Production, transport.clone());

        let result = provider.fetch_quote("THYAO").await;
        assert!(matches!(result, Err(FetchError::Transient(msg)) if msg.contains("certificate")));
        assert_eq!(transport.validated_attempts.load(Ordering::SeqCst), 1);
    }
}
