use crate::core::config::{API_URL_KEY, ConfigProvider};
use crate::core::rates::{RateFetcher, RateRequest};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Bank rate API client. Issues one GET per request, without retries.
pub struct RateApiProvider {
    config: Arc<dyn ConfigProvider>,
}

impl RateApiProvider {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RateFetcher for RateApiProvider {
    #[instrument(
        name = "RateApiFetch",
        skip(self, request),
        fields(bank = %request.bank, date = %request.date)
    )]
    async fn fetch(&self, request: &RateRequest) -> Option<String> {
        let Some(api_url) = self.config.get_string(API_URL_KEY) else {
            warn!(key = API_URL_KEY, "Rate API url is not configured");
            return None;
        };

        let url = match Url::parse_with_params(&api_url, request.query_pairs()) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, url = %api_url, "Invalid rate API url");
                return None;
            }
        };
        debug!("Requesting currency rates from {}", api_url);

        let client = match reqwest::Client::builder().user_agent("ratefeed/1.0").build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to build HTTP client");
                return None;
            }
        };

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Rate API request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "Rate API returned a non-success status");
        }

        match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Failed to read rate API response");
                None
            }
        }
    }
}
