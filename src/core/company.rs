//! Company rate settings and scheduling types

use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Banks the rate API can quote for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Bpd,
    Bnr,
    Blh,
    Bpr,
    Bsc,
    Bdi,
    Bpm,
}

impl Bank {
    /// Code sent to the API as the `bank` parameter
    pub fn code(&self) -> &'static str {
        match self {
            Bank::Bpd => "bpd",
            Bank::Bnr => "bnr",
            Bank::Blh => "blh",
            Bank::Bpr => "bpr",
            Bank::Bsc => "bsc",
            Bank::Bdi => "bdi",
            Bank::Bpm => "bpm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Bank::Bpd => "Banco Popular Dominicano",
            Bank::Bnr => "Banco de Reservas",
            Bank::Blh => "Banco Lopez de Haro",
            Bank::Bpr => "Banco del Progreso",
            Bank::Bsc => "Banco Santa Cruz",
            Bank::Bdi => "Banco BDI",
            Bank::Bpm => "Banco Promerica",
        }
    }
}

impl Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Which side of the bank quote is recorded.
///
/// The API names quotes `<prefix>buyrate` / `<prefix>sellrate`, so selection
/// is a suffix match on the quote name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateDirection {
    #[serde(rename = "buyrate", alias = "buy")]
    Buy,
    #[default]
    #[serde(rename = "sellrate", alias = "sell")]
    Sell,
}

impl RateDirection {
    pub fn suffix(&self) -> &'static str {
        match self {
            RateDirection::Buy => "buyrate",
            RateDirection::Sell => "sellrate",
        }
    }

    pub fn matches(&self, quote_name: &str) -> bool {
        quote_name.ends_with(self.suffix())
    }
}

impl Display for RateDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Manually,
    Daily,
    Weekly,
    Monthly,
}

impl IntervalUnit {
    /// Next execution date counted from `now`. `None` for manual updates.
    pub fn next_run(&self, now: NaiveDateTime) -> Option<NaiveDate> {
        let next = match self {
            IntervalUnit::Manually => return None,
            IntervalUnit::Daily => now.checked_add_days(Days::new(1)),
            IntervalUnit::Weekly => now.checked_add_days(Days::new(7)),
            IntervalUnit::Monthly => now.checked_add_months(Months::new(1)),
        };
        next.map(|dt| dt.date())
    }
}

impl Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                IntervalUnit::Manually => "manually",
                IntervalUnit::Daily => "daily",
                IntervalUnit::Weekly => "weekly",
                IntervalUnit::Monthly => "monthly",
            }
        )
    }
}

/// Per-company rate provider settings and schedule state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: Option<Bank>,
    #[serde(default)]
    pub currency_base: RateDirection,
    #[serde(default)]
    pub rate_offset: f64,
    #[serde(default = "default_interval_unit")]
    pub interval_unit: Option<IntervalUnit>,
    #[serde(default)]
    pub next_execution_date: Option<NaiveDate>,
}

fn default_interval_unit() -> Option<IntervalUnit> {
    Some(IntervalUnit::Manually)
}

impl Company {
    pub fn new(id: &str, provider: Option<Bank>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            provider,
            currency_base: RateDirection::default(),
            rate_offset: 0.0,
            interval_unit: default_interval_unit(),
            next_execution_date: None,
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_execution_date.is_some_and(|date| date <= today)
    }
}
