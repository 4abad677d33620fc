//! Seams between the update routine, the rate API and storage

use super::company::{Bank, Company};
use super::currency::CurrencyRateRecord;
use super::error::RateError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Query parameters of one rate API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRequest {
    pub bank: Bank,
    pub date: NaiveDate,
    pub uuid: String,
    pub rnc: String,
    pub username: String,
    pub hash: String,
}

impl RateRequest {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bank", self.bank.code().to_string()),
            ("date", self.date.format("%Y-%m-%d").to_string()),
            ("uuid", self.uuid.clone()),
            ("rnc", self.rnc.clone()),
            ("username", self.username.clone()),
            ("hash", self.hash.clone()),
        ]
    }
}

/// Fetches the raw rate payload. `None` means the API could not be reached.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, request: &RateRequest) -> Option<String>;
}

#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn companies(&self) -> Result<Vec<Company>, RateError>;

    async fn company(&self, id: &str) -> Result<Option<Company>, RateError>;

    async fn save_company(&self, company: &Company) -> Result<(), RateError>;

    async fn create_rate(&self, record: CurrencyRateRecord) -> Result<(), RateError>;

    /// Stored rates, oldest first, optionally for one company.
    async fn rates(&self, company_id: Option<&str>) -> Result<Vec<CurrencyRateRecord>, RateError>;

    /// Companies whose next execution date is on or before `today`.
    async fn companies_due(&self, today: NaiveDate) -> Result<Vec<Company>, RateError> {
        Ok(self
            .companies()
            .await?
            .into_iter()
            .filter(|c| c.is_due(today))
            .collect())
    }
}
