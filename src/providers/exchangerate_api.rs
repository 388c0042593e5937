use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::error::UNKNOWN_ERROR;
use crate::core::{CurrencyPair, FetchError, QuoteFetcher, RateRecord};

const SUCCESS: &str = "success";

/// Pair conversion quotes from ExchangeRate-API (`/{key}/pair/{BASE}/{QUOTE}`).
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("forex-ingest/0.1")
            .timeout(timeout)
            .build()?;
        Ok(ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn pair_url(&self, pair: &CurrencyPair) -> String {
        format!(
            "{}/{}/pair/{}/{}",
            self.base_url,
            self.api_key,
            pair.base(),
            pair.quote()
        )
    }
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: Option<String>,
    #[serde(alias = "error-type")]
    error: Option<String>,
    base_code: Option<String>,
    target_code: Option<String>,
    conversion_rate: Option<serde_json::Number>,
    time_last_update_utc: Option<String>,
}

impl PairResponse {
    fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }
}

fn parse_rate(number: &serde_json::Number) -> Result<Decimal, FetchError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FetchError::Malformed(format!("conversion_rate '{text}': {e}")))
}

#[async_trait]
impl QuoteFetcher for ExchangeRateApiProvider {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(pair = %pair))]
    async fn fetch(&self, pair: &str) -> Result<RateRecord, FetchError> {
        let pair: CurrencyPair = pair.parse()?;

        let url = self.pair_url(&pair);
        debug!(
            "Requesting pair conversion from {}",
            url.replace(&self.api_key, "***")
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, "Received ExchangeRate-API response");

        let parsed = serde_json::from_str::<PairResponse>(&body);

        if status != reqwest::StatusCode::OK {
            let message = parsed
                .map(|data| data.error_message())
                .unwrap_or_else(|_| UNKNOWN_ERROR.to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let data = parsed.map_err(|e| FetchError::Malformed(e.to_string()))?;
        if data.result.as_deref() != Some(SUCCESS) {
            return Err(FetchError::Provider(data.error_message()));
        }

        // The provider echoes the codes back; a different pair is not accepted.
        let base = data.base_code.as_deref().unwrap_or(pair.base());
        let target = data.target_code.as_deref().unwrap_or(pair.quote());
        if base != pair.base() || target != pair.quote() {
            return Err(FetchError::PairMismatch {
                requested: pair.to_string(),
                returned: format!("{base}/{target}"),
            });
        }

        let rate = data
            .conversion_rate
            .as_ref()
            .ok_or_else(|| FetchError::Malformed("missing conversion_rate".to_string()))
            .and_then(parse_rate)?;
        let observed_at = data
            .time_last_update_utc
            .ok_or_else(|| FetchError::Malformed("missing time_last_update_utc".to_string()))?;

        let record = RateRecord::new(pair, rate, observed_at)?;
        if record.observed_at_utc().is_none() {
            warn!(
                observed_at = record.observed_at(),
                "Provider timestamp is not RFC 2822, storing verbatim"
            );
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-key";

    pub async fn create_mock_server(
        pair_path: &str,
        status: u16,
        mock_response: &str,
    ) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/{API_KEY}/pair/{pair_path}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(mock_server: &MockServer) -> ExchangeRateApiProvider {
        ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY, Duration::from_secs(5))
            .expect("client builds")
    }

    #[tokio::test]
    async fn test_successful_pair_fetch() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "base_code": "USD",
            "target_code": "GBP",
            "conversion_rate": 1.27
        }"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let record = provider(&mock_server).fetch("USD/GBP").await.unwrap();
        assert_eq!(record.currency_pair().as_str(), "USD/GBP");
        assert_eq!(record.exchange_rate(), dec!(1.27));
        assert_eq!(record.observed_at(), "Mon, 01 Jan 2024 00:00:00 +0000");
    }

    #[tokio::test]
    async fn test_fetch_without_echoed_codes() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Tue, 02 Jan 2024 00:00:01 +0000",
            "conversion_rate": 0.0063
        }"#;
        let mock_server = create_mock_server("JPY/EUR", 200, mock_response).await;

        let record = provider(&mock_server).fetch("JPY/EUR").await.unwrap();
        assert_eq!(record.exchange_rate(), dec!(0.0063));
    }

    #[tokio::test]
    async fn test_provider_error_result() {
        let mock_response = r#"{"result": "error", "error": "unsupported-code"}"#;
        let mock_server = create_mock_server("USD/XXX", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/XXX").await.unwrap_err();
        assert!(matches!(err, FetchError::Provider(ref m) if m == "unsupported-code"));
        assert_eq!(err.upstream_message(), Some("unsupported-code"));
    }

    #[tokio::test]
    async fn test_provider_error_type_field() {
        let mock_response = r#"{"result": "error", "error-type": "invalid-key"}"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert_eq!(err.to_string(), "Quote provider error: invalid-key");
    }

    #[tokio::test]
    async fn test_provider_error_without_message() {
        let mock_response = r#"{"result": "error"}"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert_eq!(err.to_string(), "Quote provider error: unknown error");
        assert_eq!(err.upstream_message(), None);
    }

    #[tokio::test]
    async fn test_http_error_with_error_body() {
        let mock_response = r#"{"result": "error", "error-type": "quota-reached"}"#;
        let mock_server = create_mock_server("USD/GBP", 429, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status: 429, ref message } if message == "quota-reached"
        ));
    }

    #[tokio::test]
    async fn test_http_error_even_with_success_body() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "conversion_rate": 1.27
        }"#;
        let mock_server = create_mock_server("USD/GBP", 503, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error: 503: unknown error");
    }

    #[tokio::test]
    async fn test_http_error_without_body() {
        let mock_server = create_mock_server("USD/GBP", 500, "").await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status: 500, ref message } if message == UNKNOWN_ERROR
        ));
    }

    #[tokio::test]
    async fn test_non_ok_success_status_rejected() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "conversion_rate": 1.27
        }"#;
        for status in [201, 203] {
            let mock_server = create_mock_server("USD/GBP", status, mock_response).await;

            let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
            assert!(
                matches!(err, FetchError::Status { status: s, .. } if s == status),
                "status {status} should fail, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let mock_server = create_mock_server("USD/GBP", 200, "<html>oops</html>").await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_conversion_rate() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000"
        }"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed provider response: missing conversion_rate"
        );
    }

    #[tokio::test]
    async fn test_non_numeric_conversion_rate() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "conversion_rate": "1.27"
        }"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_zero_conversion_rate_rejected() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "conversion_rate": 0
        }"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_timestamp() {
        let mock_response = r#"{"result": "success", "conversion_rate": 1.27}"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed provider response: missing time_last_update_utc"
        );
    }

    #[tokio::test]
    async fn test_pair_mismatch_rejected() {
        let mock_response = r#"{
            "result": "success",
            "time_last_update_utc": "Mon, 01 Jan 2024 00:00:00 +0000",
            "base_code": "USD",
            "target_code": "EUR",
            "conversion_rate": 0.91
        }"#;
        let mock_server = create_mock_server("USD/GBP", 200, mock_response).await;

        let err = provider(&mock_server).fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::PairMismatch { ref requested, ref returned }
                if requested == "USD/GBP" && returned == "USD/EUR"
        ));
    }

    #[tokio::test]
    async fn test_invalid_pair_makes_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).fetch("USDGBP").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidPair(ref p) if p == "USDGBP"));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{API_KEY}/pair/USD/GBP")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"result": "success"}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let provider =
            ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY, Duration::from_millis(100))
                .unwrap();
        let err = provider.fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let provider =
            ExchangeRateApiProvider::new("http://127.0.0.1:1", API_KEY, Duration::from_secs(2))
                .unwrap();
        let err = provider.fetch("USD/GBP").await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)), "got {err:?}");
    }
}
