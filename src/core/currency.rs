//! Currency quotes, rate records and the provider code mapping

use super::error::RateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider quote prefixes and the ISO code they stand for.
pub const CURRENCY_MAPPING: [(&str, &str); 5] = [
    ("euro", "EUR"),
    ("cdol", "CAD"),
    ("doll", "USD"),
    ("poun", "GBP"),
    ("swis", "CHF"),
];

/// Resolves a quote name such as `dollsellrate` to its ISO currency code
/// using its first four characters.
pub fn map_currency(quote_name: &str) -> Result<&'static str, RateError> {
    let prefix: String = quote_name.chars().take(4).collect();
    CURRENCY_MAPPING
        .iter()
        .find(|(code, _)| *code == prefix)
        .map(|(_, iso)| *iso)
        .ok_or_else(|| RateError::UnmappedCurrency(quote_name.to_string()))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QuoteRate {
    Number(f64),
    Text(String),
}

/// One entry of the API `data` list.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyQuote {
    pub name: String,
    pub rate: QuoteRate,
}

impl CurrencyQuote {
    pub fn rate_value(&self) -> Result<f64, RateError> {
        match &self.rate {
            QuoteRate::Number(value) => Ok(*value),
            QuoteRate::Text(text) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| RateError::InvalidQuote {
                        name: self.name.clone(),
                        rate: text.clone(),
                    })
            }
        }
    }
}

/// Stored rate for a company, as `1 / (bank rate + offset)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRateRecord {
    pub currency: String,
    pub rate: f64,
    pub company_id: String,
    pub created_at: DateTime<Utc>,
}

impl CurrencyRateRecord {
    pub fn new(currency: &str, rate: f64, company_id: &str) -> Self {
        Self {
            currency: currency.to_string(),
            rate,
            company_id: company_id.to_string(),
            created_at: Utc::now(),
        }
    }
}
