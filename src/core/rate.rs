//! Currency pairs and the rate records ingested for them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::core::error::FetchError;

/// A `BASE/QUOTE` pair of ISO 4217 codes, e.g. `USD/GBP`.
///
/// The original text is kept as given so the stored pair is exactly what the
/// caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    raw: String,
    split: usize,
}

impl CurrencyPair {
    pub fn base(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn quote(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

impl FromStr for CurrencyPair {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FetchError::InvalidPair(s.to_string());
        let (base, quote) = s.split_once('/').ok_or_else(invalid)?;
        if !is_currency_code(base) || !is_currency_code(quote) {
            return Err(invalid());
        }
        Ok(CurrencyPair {
            raw: s.to_string(),
            split: base.len(),
        })
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One observed exchange rate. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    currency_pair: CurrencyPair,
    exchange_rate: Decimal,
    observed_at: String,
}

impl RateRecord {
    /// Builds a record, rejecting non-positive rates and empty timestamps.
    pub fn new(
        currency_pair: CurrencyPair,
        exchange_rate: Decimal,
        observed_at: impl Into<String>,
    ) -> Result<Self, FetchError> {
        if exchange_rate <= Decimal::ZERO {
            return Err(FetchError::Malformed(format!(
                "conversion_rate must be positive, got {exchange_rate}"
            )));
        }
        let observed_at = observed_at.into();
        if observed_at.trim().is_empty() {
            return Err(FetchError::Malformed(
                "time_last_update_utc is empty".to_string(),
            ));
        }
        Ok(RateRecord {
            currency_pair,
            exchange_rate,
            observed_at,
        })
    }

    pub fn currency_pair(&self) -> &CurrencyPair {
        &self.currency_pair
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.exchange_rate
    }

    /// Timestamp exactly as the provider reported it.
    pub fn observed_at(&self) -> &str {
        &self.observed_at
    }

    /// Provider timestamp parsed as RFC 2822, if it is in that format.
    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(&self.observed_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn pair(s: &str) -> CurrencyPair {
        s.parse().expect("valid pair")
    }

    #[test]
    fn test_parse_valid_pair() {
        let p = pair("USD/GBP");
        assert_eq!(p.base(), "USD");
        assert_eq!(p.quote(), "GBP");
        assert_eq!(p.as_str(), "USD/GBP");
        assert_eq!(p.to_string(), "USD/GBP");
    }

    #[test]
    fn test_parse_invalid_pairs() {
        for input in [
            "", "USD", "USD/", "/GBP", "USDGBP", "USD/GBP/EUR", "usd/gbp", "US/GBP", "USD/GBPX",
            "USD GBP", "USD/GB1",
        ] {
            let err = input.parse::<CurrencyPair>().unwrap_err();
            assert!(
                matches!(err, FetchError::InvalidPair(ref s) if s == input),
                "expected InvalidPair for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_record_keeps_fields_verbatim() {
        let record =
            RateRecord::new(pair("USD/GBP"), dec!(1.27), "Mon, 01 Jan 2024 00:00:00 +0000")
                .unwrap();
        assert_eq!(record.currency_pair().as_str(), "USD/GBP");
        assert_eq!(record.exchange_rate(), dec!(1.27));
        assert_eq!(record.observed_at(), "Mon, 01 Jan 2024 00:00:00 +0000");
        assert_eq!(
            record.observed_at_utc(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_record_rejects_non_positive_rate() {
        for rate in [dec!(0), dec!(-1.5)] {
            let err = RateRecord::new(pair("EUR/USD"), rate, "Mon, 01 Jan 2024 00:00:00 +0000")
                .unwrap_err();
            assert!(matches!(err, FetchError::Malformed(_)));
        }
    }

    #[test]
    fn test_record_rejects_empty_timestamp() {
        let err = RateRecord::new(pair("EUR/USD"), dec!(1.1), "  ").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_unparseable_timestamp_is_kept() {
        let record = RateRecord::new(pair("EUR/USD"), dec!(1.1), "yesterday").unwrap();
        assert_eq!(record.observed_at(), "yesterday");
        assert!(record.observed_at_utc().is_none());
    }
}
