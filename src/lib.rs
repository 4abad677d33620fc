pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::{AppConfig, ConfigProvider};
use crate::core::{RateRepository, RateUpdater, Scheduler};
use crate::providers::rate_api::RateApiProvider;
use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    /// Update every company whose next execution date has been reached
    Run,
    /// Update companies right away, without touching their schedule
    Update { company: Option<String> },
    Rates { company: Option<String> },
    Companies,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Rate feed starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    let store_path = config.default_data_path()?.join("store");
    let store = store::DiskStore::open(&store_path)?;
    execute(command, &config, Arc::new(store)).await
}

/// Runs `command` against an already opened store.
pub async fn execute(
    command: AppCommand,
    config: &AppConfig,
    store: Arc<dyn RateRepository>,
) -> Result<()> {
    store::sync_companies(store.as_ref(), &config.companies)
        .await
        .context("Failed to sync configured companies")?;

    let today = Local::now().date_naive();
    debug!(%today, "Executing command");

    match command {
        AppCommand::Run => {
            let lock_path = config.default_data_path()?.join(store::RUN_LOCK_FILE);
            let mut run_lock = store::RunLock::open(&lock_path)?;
            let Some(_guard) = run_lock.try_acquire()? else {
                warn!(path = %lock_path.display(), "Another rate update holds the run lock");
                cli::update::print_skipped_run();
                return Ok(());
            };

            let updater = build_updater(config, Arc::clone(&store));
            let scheduler = Scheduler::new(store, updater);
            cli::update::run_due(&scheduler, today).await
        }
        AppCommand::Update { company } => {
            let mut companies = store
                .companies()
                .await
                .context("Failed to read stored companies")?;
            if let Some(id) = &company {
                companies.retain(|c| &c.id == id);
                if companies.is_empty() {
                    anyhow::bail!("Unknown company: {id}");
                }
            }
            let updater = build_updater(config, store);
            cli::update::update_now(&updater, &companies, today).await
        }
        AppCommand::Rates { company } => cli::rates::run(store.as_ref(), company.as_deref()).await,
        AppCommand::Companies => cli::companies::run(store.as_ref()).await,
    }
}

fn build_updater(config: &AppConfig, store: Arc<dyn RateRepository>) -> RateUpdater {
    let params: Arc<dyn ConfigProvider> = Arc::new(config.clone());
    let fetcher = Arc::new(RateApiProvider::new(Arc::clone(&params)));
    RateUpdater::new(fetcher, store, params, config.user.clone())
        .with_unmapped_policy(config.on_unmapped_currency)
}
