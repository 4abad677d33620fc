//! Fetches bank quotes for a batch of companies and records the inverse rates.

use super::company::{Bank, Company};
use super::config::{
    API_TOKEN_KEY, ConfigProvider, DATABASE_UUID_KEY, UnmappedCurrencyPolicy, UserConfig,
};
use super::currency::{CurrencyQuote, CurrencyRateRecord, map_currency};
use super::error::RateError;
use super::rates::{RateFetcher, RateRepository, RateRequest};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one company's update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    /// The API returned a `data` list. `skipped` holds quote names that
    /// matched the rate direction but could not be recorded.
    Updated { created: usize, skipped: Vec<String> },
    NoProvider,
    NoData,
}

impl UpdateStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateStatus::Updated { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyOutcome {
    pub company_id: String,
    pub status: UpdateStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub outcomes: Vec<CompanyOutcome>,
}

impl UpdateReport {
    /// True when every company in the batch got data. An empty batch succeeds.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn records_created(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                UpdateStatus::Updated { created, .. } => *created,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_companies(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .map(|o| o.company_id.as_str())
            .collect()
    }
}

pub struct RateUpdater {
    fetcher: Arc<dyn RateFetcher>,
    store: Arc<dyn RateRepository>,
    config: Arc<dyn ConfigProvider>,
    user: UserConfig,
    on_unmapped: UnmappedCurrencyPolicy,
}

impl RateUpdater {
    pub fn new(
        fetcher: Arc<dyn RateFetcher>,
        store: Arc<dyn RateRepository>,
        config: Arc<dyn ConfigProvider>,
        user: UserConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            config,
            user,
            on_unmapped: UnmappedCurrencyPolicy::default(),
        }
    }

    pub fn with_unmapped_policy(mut self, policy: UnmappedCurrencyPolicy) -> Self {
        self.on_unmapped = policy;
        self
    }

    /// Updates every company in `companies`, one after another.
    ///
    /// Soft failures (no provider, unreachable API, payload without `data`)
    /// are reported per company and never stop the batch. Errors are
    /// returned for storage failures, and for unmapped quotes under
    /// [`UnmappedCurrencyPolicy::Abort`].
    #[instrument(
        name = "RateUpdate",
        skip_all,
        fields(companies = companies.len(), today = %today)
    )]
    pub async fn update_rates(
        &self,
        companies: &[Company],
        today: NaiveDate,
    ) -> Result<UpdateReport, RateError> {
        let mut report = UpdateReport::default();

        for company in companies {
            let status = self.update_company(company, today).await?;
            if !status.is_success() {
                debug!(
                    company = %company.id,
                    status = ?status,
                    "Unable to fetch new rate records from API"
                );
            }
            report.outcomes.push(CompanyOutcome {
                company_id: company.id.clone(),
                status,
            });
        }

        Ok(report)
    }

    async fn update_company(
        &self,
        company: &Company,
        today: NaiveDate,
    ) -> Result<UpdateStatus, RateError> {
        let Some(bank) = company.provider else {
            warn!(company = %company.id, "Company has no rate provider");
            return Ok(UpdateStatus::NoProvider);
        };

        info!(company = %company.id, %bank, "Calling API rates resource");
        let request = self.build_request(bank, today);
        let body = self.fetcher.fetch(&request).await;
        let Some(payload) = parse_payload(body.as_deref()) else {
            return Ok(UpdateStatus::NoData);
        };

        let Some(quotes) = payload.get("data").and_then(Value::as_array) else {
            warn!(company = %company.id, "API response has no data list");
            return Ok(UpdateStatus::NoData);
        };

        let mut created = 0;
        let mut skipped = Vec::new();

        for raw in quotes {
            let Some(name) = raw.get("name").and_then(Value::as_str) else {
                debug!(company = %company.id, quote = %raw, "Ignoring quote without a name");
                continue;
            };
            if !company.currency_base.matches(name) {
                continue;
            }

            let quote: CurrencyQuote = match serde_json::from_value(raw.clone()) {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(
                        company = %company.id,
                        error = %e,
                        quote = %raw,
                        "Skipping malformed quote"
                    );
                    skipped.push(name.to_string());
                    continue;
                }
            };

            let inverse_rate = match quote.rate_value() {
                Ok(rate) => 1.0 / (rate + company.rate_offset),
                Err(e) => {
                    warn!(company = %company.id, error = %e, "Skipping quote");
                    skipped.push(quote.name);
                    continue;
                }
            };
            if !inverse_rate.is_finite() {
                warn!(
                    company = %company.id,
                    quote = %quote.name,
                    offset = company.rate_offset,
                    "Inverse rate is not finite, skipping quote"
                );
                skipped.push(quote.name);
                continue;
            }

            let currency = match map_currency(&quote.name) {
                Ok(currency) => currency,
                Err(e) => match self.on_unmapped {
                    UnmappedCurrencyPolicy::Abort => return Err(e),
                    UnmappedCurrencyPolicy::Skip => {
                        warn!(company = %company.id, error = %e, "Skipping quote");
                        skipped.push(quote.name);
                        continue;
                    }
                },
            };

            debug!(company = %company.id, currency, rate = inverse_rate, "Recording rate");
            self.store
                .create_rate(CurrencyRateRecord::new(currency, inverse_rate, &company.id))
                .await?;
            created += 1;
        }

        Ok(UpdateStatus::Updated { created, skipped })
    }

    fn build_request(&self, bank: Bank, today: NaiveDate) -> RateRequest {
        RateRequest {
            bank,
            date: today,
            uuid: self.config.get_string(DATABASE_UUID_KEY).unwrap_or_default(),
            rnc: self.user.vat.clone().unwrap_or_default(),
            username: self.user.name.clone(),
            hash: self.config.get_string(API_TOKEN_KEY).unwrap_or_default(),
        }
    }
}

/// Parses the API body as a JSON object. `None` when there is nothing usable.
///
/// A missing body is only logged at debug level, the fetcher has already
/// warned about the transport failure.
fn parse_payload(body: Option<&str>) -> Option<Map<String, Value>> {
    let Some(body) = body else {
        debug!("No response body from rate API");
        return None;
    };

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(response = %other, "API response is not a JSON object");
            None
        }
        Err(e) => {
            warn!(error = %e, "No serializable data from API response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::company::{IntervalUnit, RateDirection};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .without_time()
                .with_max_level(tracing::Level::WARN)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn warnings(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|line| line.contains("WARN"))
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    struct MockFetcher {
        response: Option<String>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<RateRequest>>,
    }

    impl MockFetcher {
        fn new(response: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map(str::to_string),
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateFetcher for MockFetcher {
        async fn fetch(&self, request: &RateRequest) -> Option<String> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    const RATES_JSON: &str = r#"{
        "data": [
            {"name": "dollbuyrate", "rate": "57.90"},
            {"name": "dollsellrate", "rate": "58.5"},
            {"name": "eurobuyrate", "rate": "62.00"},
            {"name": "eurosellrate", "rate": "64.00"}
        ]
    }"#;

    fn params() -> Arc<HashMap<String, String>> {
        let mut params = HashMap::new();
        params.insert(DATABASE_UUID_KEY.to_string(), "db-uuid".to_string());
        params.insert(API_TOKEN_KEY.to_string(), "token".to_string());
        Arc::new(params)
    }

    fn user() -> UserConfig {
        UserConfig {
            name: "Administrator".to_string(),
            vat: Some("101000001".to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn updater(fetcher: Arc<MockFetcher>, store: &MemoryStore) -> RateUpdater {
        RateUpdater::new(fetcher, Arc::new(store.clone()), params(), user())
    }

    fn company(id: &str, base: RateDirection, offset: f64) -> Company {
        let mut company = Company::new(id, Some(Bank::Bpd));
        company.currency_base = base;
        company.rate_offset = offset;
        company.interval_unit = Some(IntervalUnit::Daily);
        company
    }

    #[tokio::test]
    async fn test_sell_rate_is_inverted() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);

        let report = updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.records_created(), 2);

        let rates = store.rates(Some("main")).await.unwrap();
        assert_eq!(rates.len(), 2);
        let usd = rates.iter().find(|r| r.currency == "USD").unwrap();
        assert!((usd.rate - 1.0 / 58.5).abs() < 1e-12);
        assert!((usd.rate - 0.017094).abs() < 1e-6);
        let eur = rates.iter().find(|r| r.currency == "EUR").unwrap();
        assert_eq!(eur.rate, 1.0 / 64.0);
    }

    #[tokio::test]
    async fn test_offset_is_added_before_inverting() {
        let fetcher = MockFetcher::new(Some(
            r#"{"data": [{"name": "dollbuyrate", "rate": 8}]}"#,
        ));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);

        updater
            .update_rates(&[company("main", RateDirection::Buy, 2.0)], today())
            .await
            .unwrap();

        let rates = store.rates(None).await.unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].currency, "USD");
        assert!((rates[0].rate - 0.1).abs() < 1e-12);
        assert_eq!(rates[0].company_id, "main");
    }

    #[tokio::test]
    async fn test_request_parameters() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);

        updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            RateRequest {
                bank: Bank::Bpd,
                date: today(),
                uuid: "db-uuid".to_string(),
                rnc: "101000001".to_string(),
                username: "Administrator".to_string(),
                hash: "token".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_vat_sends_empty_rnc() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = RateUpdater::new(
            fetcher.clone(),
            Arc::new(store.clone()),
            Arc::new(HashMap::<String, String>::new()),
            UserConfig::default(),
        );

        updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests[0].rnc, "");
        assert_eq!(requests[0].uuid, "");
        assert_eq!(requests[0].hash, "");
    }

    #[tokio::test]
    async fn test_company_without_provider_is_not_fetched() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);
        let mut no_provider = company("main", RateDirection::Sell, 0.0);
        no_provider.provider = None;

        let report = updater.update_rates(&[no_provider], today()).await.unwrap();

        assert_eq!(fetcher.calls(), 0);
        assert!(!report.all_succeeded());
        assert_eq!(report.outcomes[0].status, UpdateStatus::NoProvider);
        assert!(store.rates(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_soft_failure() {
        let fetcher = MockFetcher::new(None);
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);

        let report = updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.outcomes[0].status, UpdateStatus::NoData);
        assert!(store.rates(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_logs_one_warning() {
        use crate::core::config::API_URL_KEY;
        use crate::providers::rate_api::RateApiProvider;

        let mock_server = wiremock::MockServer::builder().start().await;
        let api_url = format!("{}/rates", mock_server.uri());
        drop(mock_server);

        let mut config = HashMap::new();
        config.insert(API_URL_KEY.to_string(), api_url);
        let config: Arc<dyn ConfigProvider> = Arc::new(config);
        let store = MemoryStore::new();
        let updater = RateUpdater::new(
            Arc::new(RateApiProvider::new(Arc::clone(&config))),
            Arc::new(store.clone()),
            config,
            user(),
        );

        let logs = LogBuffer::default();
        let report = {
            let _guard = logs.install();
            updater
                .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
                .await
                .unwrap()
        };

        assert!(!report.all_succeeded());
        assert!(store.rates(None).await.unwrap().is_empty());
        let warnings = logs.warnings();
        assert_eq!(warnings.len(), 1, "warnings: {warnings:?}");
        assert!(warnings[0].contains("Rate API request failed"));
    }

    #[tokio::test]
    async fn test_malformed_and_dataless_payloads() {
        for body in ["not json", "[1, 2, 3]", r#"{"error": "bad hash"}"#, r#"{"data": "none"}"#] {
            let fetcher = MockFetcher::new(Some(body));
            let store = MemoryStore::new();
            let updater = updater(fetcher, &store);

            let report = updater
                .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
                .await
                .unwrap();

            assert_eq!(report.outcomes[0].status, UpdateStatus::NoData, "body: {body}");
            assert!(store.rates(None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_data_list_succeeds() {
        let fetcher = MockFetcher::new(Some(r#"{"data": []}"#));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);

        let report = updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.records_created(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);
        let mut no_provider = company("first", RateDirection::Sell, 0.0);
        no_provider.provider = None;

        let report = updater
            .update_rates(
                &[no_provider, company("second", RateDirection::Sell, 0.0)],
                today(),
            )
            .await
            .unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_companies(), vec!["first"]);
        assert!(report.outcomes[1].status.is_success());
        assert_eq!(store.rates(Some("second")).await.unwrap().len(), 2);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_quote_is_skipped_by_default() {
        let fetcher = MockFetcher::new(Some(
            r#"{"data": [
                {"name": "yensellrate", "rate": "0.39"},
                {"name": "dollsellrate", "rate": "58.5"}
            ]}"#,
        ));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);

        let report = updater
            .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
            .await
            .unwrap();

        assert_eq!(
            report.outcomes[0].status,
            UpdateStatus::Updated {
                created: 1,
                skipped: vec!["yensellrate".to_string()],
            }
        );
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_unmapped_quote_aborts_batch_when_configured() {
        let fetcher = MockFetcher::new(Some(
            r#"{"data": [{"name": "yensellrate", "rate": "0.39"}]}"#,
        ));
        let store = MemoryStore::new();
        let updater =
            updater(fetcher.clone(), &store).with_unmapped_policy(UnmappedCurrencyPolicy::Abort);

        let result = updater
            .update_rates(
                &[
                    company("first", RateDirection::Sell, 0.0),
                    company("second", RateDirection::Sell, 0.0),
                ],
                today(),
            )
            .await;

        assert!(matches!(result, Err(RateError::UnmappedCurrency(_))));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_rates_are_skipped() {
        let fetcher = MockFetcher::new(Some(
            r#"{"data": [
                {"name": "dollsellrate", "rate": "-2"},
                {"name": "eurosellrate", "rate": "n/a"},
                {"rate": "1.0"},
                {"name": "pounsellrate", "rate": "74.0"}
            ]}"#,
        ));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);

        let report = updater
            .update_rates(&[company("main", RateDirection::Sell, 2.0)], today())
            .await
            .unwrap();

        assert_eq!(
            report.outcomes[0].status,
            UpdateStatus::Updated {
                created: 1,
                skipped: vec!["dollsellrate".to_string(), "eurosellrate".to_string()],
            }
        );
        let rates = store.rates(None).await.unwrap();
        assert_eq!(rates[0].currency, "GBP");
        assert_eq!(rates[0].rate, 1.0 / 76.0);
    }

    #[tokio::test]
    async fn test_only_matching_quotes_are_decoded() {
        let fetcher = MockFetcher::new(Some(
            r#"{"data": [
                {"name": "dollbuyrate", "rate": null},
                {"name": "dollsellrate", "rate": null},
                {"name": "eurosellrate", "rate": "NaN"},
                {"name": "pounsellrate", "rate": "74.0"}
            ]}"#,
        ));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);

        let logs = LogBuffer::default();
        let report = {
            let _guard = logs.install();
            updater
                .update_rates(&[company("main", RateDirection::Sell, 0.0)], today())
                .await
                .unwrap()
        };

        assert_eq!(
            report.outcomes[0].status,
            UpdateStatus::Updated {
                created: 1,
                skipped: vec!["dollsellrate".to_string(), "eurosellrate".to_string()],
            }
        );
        let warnings = logs.warnings();
        assert_eq!(warnings.len(), 2, "warnings: {warnings:?}");
        assert!(warnings.iter().all(|w| !w.contains("dollbuyrate")));
        assert!(warnings[1].contains("Inverse rate is not finite"));
    }

    #[tokio::test]
    async fn test_repeated_update_duplicates_records() {
        let fetcher =
            MockFetcher::new(Some(r#"{"data": [{"name": "dollsellrate", "rate": "58.5"}]}"#));
        let store = MemoryStore::new();
        let updater = updater(fetcher, &store);
        let companies = [company("main", RateDirection::Sell, 0.0)];

        updater.update_rates(&companies, today()).await.unwrap();
        updater.update_rates(&companies, today()).await.unwrap();

        let rates = store.rates(Some("main")).await.unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].rate, rates[1].rate);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let fetcher = MockFetcher::new(Some(RATES_JSON));
        let store = MemoryStore::new();
        let updater = updater(fetcher.clone(), &store);

        let report = updater.update_rates(&[], today()).await.unwrap();
        assert!(report.all_succeeded());
        assert_eq!(fetcher.calls(), 0);
    }
}
