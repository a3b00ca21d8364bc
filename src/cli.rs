use chrono::{Datelike, NaiveDate};
use clap::Parser;

use crate::error::{Error, Result};
use crate::fetcher::format_fecha;

/// Fetch the official SUNAT exchange rate for a day and store it as the active rate.
#[derive(Parser, Debug)]
#[command(name = "tipo-cambio-sync", version, about, long_about = None)]
pub struct Args {
    /// Year, e.g. 2025 [default: current year]
    pub year: Option<i32>,

    /// Month, 1-12 [default: current month]
    #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Day of month, 1-31 [default: current day]
    #[arg(value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day: Option<u32>,
}

impl Args {
    /// Fills each missing field from `today` independently.
    pub fn target_date(&self, today: NaiveDate) -> Result<NaiveDate> {
        let year = self.year.unwrap_or(today.year());
        let month = self.month.unwrap_or(today.month());
        let day = self.day.unwrap_or(today.day());

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| Error::InvalidDate(format_fecha(year, month, day)))
    }
}
