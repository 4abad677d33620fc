//! Core business logic: companies, rate quotes and the update routine

pub mod company;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod rates;
pub mod scheduler;
pub mod updater;

// Re-export main types for cleaner imports
pub use company::{Bank, Company, IntervalUnit, RateDirection};
pub use error::RateError;
pub use rates::{RateFetcher, RateRepository, RateRequest};
pub use scheduler::{RunSummary, Scheduler};
pub use updater::{RateUpdater, UpdateReport, UpdateStatus};
