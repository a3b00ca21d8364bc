use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, header};
use serde::Serialize;

use crate::config::PortalConfig;
use crate::error::{Error, Result};
use crate::tipo_cambio::{COD_COMPRA, COD_VENTA, TipoCambio};
use crate::token::TokenSource;

const USER_AGENT: &str = "Mozilla/5.0";

/// Buy and sell quotations found for one day, as literal upstream text.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotationDay {
    /// `DD/MM/YYYY`, zero-padded.
    pub date: String,
    pub compra: Option<String>,
    pub venta: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(QuotationDay),
    /// Nothing published for that day, typically a weekend or holiday.
    NotFound {
        date: String,
    },
}

#[async_trait]
pub trait QuotationSource: Send + Sync {
    async fn fetch_day(&self, year: i32, month: u32, day: u32) -> Result<FetchOutcome>;
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    anio: i32,
    /// Zero-based month.
    mes: u32,
    token: &'a str,
}

/// Client for the portal's monthly listing endpoint.
pub struct SunatClient<T> {
    client: Client,
    token_source: T,
    list_url: String,
    referer: String,
}

impl<T: TokenSource> SunatClient<T> {
    pub fn new(token_source: T, portal: &PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(portal.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token_source,
            list_url: portal.list_url.clone(),
            referer: portal.page_url.clone(),
        })
    }

    async fn list_month(&self, year: i32, month: u32, token: &str) -> Result<Vec<TipoCambio>> {
        let body = ListRequest {
            anio: year,
            mes: month - 1,
            token,
        };
        debug!("POST {} anio={} mes={}", self.list_url, body.anio, body.mes);

        let resp = self
            .client
            .post(&self.list_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::REFERER, &self.referer)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "Can't list exchange rates: {}",
                resp.status()
            )));
        }

        Ok(resp.json::<Vec<TipoCambio>>().await?)
    }
}

#[async_trait]
impl<T: TokenSource> QuotationSource for SunatClient<T> {
    async fn fetch_day(&self, year: i32, month: u32, day: u32) -> Result<FetchOutcome> {
        validate_day(month, day)?;

        let token = self.token_source.acquire_token().await?;
        let records = self.list_month(year, month, &token).await?;
        info!(
            "Received {} quotations for {:04}-{:02}",
            records.len(),
            year,
            month
        );

        Ok(find_quotation(&records, year, month, day))
    }
}

fn validate_day(month: u32, day: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidDate(format!("month {month} out of range 1-12")));
    }
    if !(1..=31).contains(&day) {
        return Err(Error::InvalidDate(format!("day {day} out of range 1-31")));
    }
    Ok(())
}

/// The key upstream uses for a day: `DD/MM/YYYY`.
pub fn format_fecha(year: i32, month: u32, day: u32) -> String {
    format!("{:02}/{:02}/{}", day, month, year)
}

/// Picks the first buy and first sell record whose date text equals the
/// requested day. Position in the list is irrelevant.
pub fn find_quotation(records: &[TipoCambio], year: i32, month: u32, day: u32) -> FetchOutcome {
    let date = format_fecha(year, month, day);
    let value_for = |code: &str| {
        records
            .iter()
            .find(|r| r.fec_publica == date && r.cod_tipo == code)
            .map(|r| r.val_tipo.as_text())
    };

    let compra = value_for(COD_COMPRA);
    let venta = value_for(COD_VENTA);

    if compra.is_none() && venta.is_none() {
        FetchOutcome::NotFound { date }
    } else {
        FetchOutcome::Found(QuotationDay {
            date,
            compra,
            venta,
        })
    }
}
