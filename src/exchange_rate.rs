use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fetcher::QuotationDay;

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub date: NaiveDate,
    pub value_buy: Decimal,
    pub value_sell: Decimal,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredExchangeRate {
    pub id: Uuid,
    pub rate_date: NaiveDate,
    pub value_buy: Decimal,
    pub value_sell: Decimal,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Converts the literal upstream fields into typed values. Both sides are
    /// required for a row.
    pub fn from_quotation(quotation: &QuotationDay, created_by: Option<String>) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&quotation.date, "%d/%m/%Y")
            .map_err(|e| Error::Conversion(format!("invalid date {:?}: {}", quotation.date, e)))?;
        let value_buy = parse_rate("compra", quotation.compra.as_deref(), &quotation.date)?;
        let value_sell = parse_rate("venta", quotation.venta.as_deref(), &quotation.date)?;

        Ok(Self {
            id: Uuid::new_v4(),
            date,
            value_buy,
            value_sell,
            created_by,
        })
    }
}

fn parse_rate(side: &str, value: Option<&str>, date: &str) -> Result<Decimal> {
    let Some(value) = value else {
        return Err(Error::Conversion(format!("no {} quotation for {}", side, date)));
    };
    let normalized_string = normalize_decimal_string(value);
    Decimal::from_str(&normalized_string)
        .map_err(|e| Error::Conversion(format!("invalid {} value {:?}: {}", side, value, e)))
}

fn normalize_decimal_string(s: &str) -> String {
    s.trim().replace(',', ".")
}
