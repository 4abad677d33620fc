use crate::core::company::Company;
use crate::core::currency::CurrencyRateRecord;
use crate::core::error::RateError;
use crate::core::rates::RateRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const COMPANIES_PARTITION: &str = "companies";
const RATES_PARTITION: &str = "rates";

/// Persistent repository backed by a fjall keyspace.
///
/// Companies are keyed by id. Rates are keyed by
/// `<company>:<created_at nanos>:<sequence>` so that repeated updates on the
/// same day add records instead of replacing them.
pub struct DiskStore {
    keyspace: Keyspace,
    companies: PartitionHandle,
    rates: PartitionHandle,
    sequence: AtomicU64,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let companies = keyspace
            .open_partition(COMPANIES_PARTITION, PartitionCreateOptions::default())
            .context("Failed to open companies partition")?;
        let rates = keyspace
            .open_partition(RATES_PARTITION, PartitionCreateOptions::default())
            .context("Failed to open rates partition")?;

        debug!("Opened rate store at {}", path.display());
        Ok(Self {
            keyspace,
            companies,
            rates,
            sequence: AtomicU64::new(0),
        })
    }

    fn rate_key(&self, record: &CurrencyRateRecord) -> String {
        format!(
            "{}:{:020}:{:06}",
            record.company_id,
            record.created_at.timestamp_nanos_opt().unwrap_or_default(),
            self.sequence.fetch_add(1, Ordering::SeqCst)
        )
    }
}

#[async_trait]
impl RateRepository for DiskStore {
    async fn companies(&self) -> Result<Vec<Company>, RateError> {
        let mut companies = Vec::new();
        for item in self.companies.iter() {
            let (_, value) = item?;
            companies.push(serde_json::from_slice(&value)?);
        }
        Ok(companies)
    }

    async fn company(&self, id: &str) -> Result<Option<Company>, RateError> {
        match self.companies.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn save_company(&self, company: &Company) -> Result<(), RateError> {
        self.companies
            .insert(company.id.as_str(), serde_json::to_vec(company)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(company = %company.id, "Store PUT company");
        Ok(())
    }

    async fn create_rate(&self, record: CurrencyRateRecord) -> Result<(), RateError> {
        let key = self.rate_key(&record);
        self.rates.insert(key.as_str(), serde_json::to_vec(&record)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(%key, "Store PUT rate");
        Ok(())
    }

    async fn rates(&self, company_id: Option<&str>) -> Result<Vec<CurrencyRateRecord>, RateError> {
        let items: Vec<_> = match company_id {
            Some(id) => self.rates.prefix(format!("{id}:")).collect(),
            None => self.rates.iter().collect(),
        };

        let mut rates = Vec::with_capacity(items.len());
        for item in items {
            let (_, value) = item?;
            let record = serde_json::from_slice::<CurrencyRateRecord>(&value)?;
            // Ids may contain ':', so "a:" also prefixes keys of company "a:b"
            if company_id.is_none_or(|id| record.company_id == id) {
                rates.push(record);
            }
        }
        rates.sort_by_key(|r| r.created_at);
        Ok(rates)
    }
}
