use chrono::{Datelike, NaiveDate};
use log::info;

use crate::error::Result;
use crate::exchange_rate::ExchangeRate;
use crate::fetcher::{FetchOutcome, QuotationDay, QuotationSource};
use crate::store::RateStore;

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    NotFound {
        date: String,
    },
    Stored {
        quotation: QuotationDay,
        rate: ExchangeRate,
    },
}

pub async fn run(
    source: &dyn QuotationSource,
    store: &dyn RateStore,
    date: NaiveDate,
    created_by: Option<String>,
) -> Result<RunOutcome> {
    let (year, month, day) = (date.year(), date.month(), date.day());
    let quotation = match source.fetch_day(year, month, day).await? {
        FetchOutcome::Found(quotation) => quotation,
        FetchOutcome::NotFound { date } => {
            info!("No quotation published for {}", date);
            return Ok(RunOutcome::NotFound { date });
        }
    };
    info!(
        "Quotation for {}: compra={:?} venta={:?}",
        quotation.date, quotation.compra, quotation.venta
    );

    let rate = ExchangeRate::from_quotation(&quotation, created_by)?;
    store.upsert_active_rate(&rate).await?;

    Ok(RunOutcome::Stored { quotation, rate })
}
