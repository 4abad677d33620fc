pub mod rate_api;
