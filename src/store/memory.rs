use crate::core::company::Company;
use crate::core::currency::CurrencyRateRecord;
use crate::core::error::RateError;
use crate::core::rates::RateRepository;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory repository, used by tests and dry runs
#[derive(Clone, Default)]
pub struct MemoryStore {
    companies: Arc<Mutex<BTreeMap<String, Company>>>,
    rates: Arc<Mutex<Vec<CurrencyRateRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_companies(companies: Vec<Company>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.companies.lock().await;
            for company in companies {
                inner.insert(company.id.clone(), company);
            }
        }
        store
    }
}

#[async_trait]
impl RateRepository for MemoryStore {
    async fn companies(&self) -> Result<Vec<Company>, RateError> {
        let companies = self.companies.lock().await;
        Ok(companies.values().cloned().collect())
    }

    async fn company(&self, id: &str) -> Result<Option<Company>, RateError> {
        let companies = self.companies.lock().await;
        Ok(companies.get(id).cloned())
    }

    async fn save_company(&self, company: &Company) -> Result<(), RateError> {
        let mut companies = self.companies.lock().await;
        debug!(company = %company.id, "Memory store PUT company");
        companies.insert(company.id.clone(), company.clone());
        Ok(())
    }

    async fn create_rate(&self, record: CurrencyRateRecord) -> Result<(), RateError> {
        let mut rates = self.rates.lock().await;
        debug!(company = %record.company_id, currency = %record.currency, "Memory store PUT rate");
        rates.push(record);
        Ok(())
    }

    async fn rates(&self, company_id: Option<&str>) -> Result<Vec<CurrencyRateRecord>, RateError> {
        let rates = self.rates.lock().await;
        Ok(rates
            .iter()
            .filter(|r| company_id.is_none_or(|id| r.company_id == id))
            .cloned()
            .collect())
    }
}
