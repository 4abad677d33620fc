//! Terminal front end: setup, update runs and stored data listings

pub mod companies;
pub mod rates;
pub mod setup;
pub mod ui;
pub mod update;
