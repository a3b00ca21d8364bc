use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};

use crate::config::{DatabaseConfig, PersistMode};
use crate::error::Result;
use crate::exchange_rate::{ExchangeRate, StoredExchangeRate};

const DEACTIVATE_SQL: &str = r#"
    UPDATE exchange_rate
       SET is_active = FALSE
     WHERE rate_date = $1
       AND is_active
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO exchange_rate (id, rate_date, value_buy, value_sell, is_active, created_by)
    VALUES ($1, $2, $3, $4, TRUE, $5)
"#;

const CALL_SQL: &str = "CALL insert_exchange_rate($1, $2, $3, $4, $5)";

/// Destination for the active rate of a day.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Makes `rate` the only active row for its date. Either both the
    /// deactivation and the insert take effect or neither does.
    async fn upsert_active_rate(&self, rate: &ExchangeRate) -> Result<()>;
}

/// Postgres store opening one connection per call.
pub struct PgRateStore {
    options: PgConnectOptions,
    mode: PersistMode,
}

impl PgRateStore {
    /// Settings missing from `config` fall back to the driver's own defaults
    /// (`PGHOST`, `PGUSER`, ...).
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut options = PgConnectOptions::new();
        if let Some(host) = &config.host {
            options = options.host(host);
        }
        if let Some(port) = config.port {
            options = options.port(port);
        }
        if let Some(name) = &config.name {
            options = options.database(name);
        }
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        Self::with_options(options, config.mode)
    }

    pub fn with_options(options: PgConnectOptions, mode: PersistMode) -> Self {
        Self { options, mode }
    }

    async fn connect(&self) -> Result<PgConnection> {
        debug!(
            "Connecting to {}:{}",
            self.options.get_host(),
            self.options.get_port()
        );
        Ok(PgConnection::connect_with(&self.options).await?)
    }

    /// Rows currently flagged active for `date`.
    pub async fn active_rates(&self, date: NaiveDate) -> Result<Vec<StoredExchangeRate>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query_as::<_, StoredExchangeRate>(
            r#"
            SELECT id, rate_date, value_buy, value_sell, is_active, created_by, created_at
              FROM exchange_rate
             WHERE rate_date = $1
               AND is_active
             ORDER BY created_at
            "#,
        )
        .bind(date)
        .fetch_all(&mut conn)
        .await;
        close_quietly(conn).await;
        Ok(rows?)
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn upsert_active_rate(&self, rate: &ExchangeRate) -> Result<()> {
        let mut conn = self.connect().await?;
        let result = write_active_rate(&mut conn, rate, self.mode).await;
        close_quietly(conn).await;
        result
    }
}

async fn write_active_rate(
    conn: &mut PgConnection,
    rate: &ExchangeRate,
    mode: PersistMode,
) -> Result<()> {
    // Dropping `tx` on an early return rolls back.
    let mut tx = conn.begin().await?;

    match mode {
        PersistMode::Statements => {
            let deactivated = sqlx::query(DEACTIVATE_SQL)
                .bind(rate.date)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            debug!("Deactivated {} rows for {}", deactivated, rate.date);

            sqlx::query(INSERT_SQL)
                .bind(rate.id)
                .bind(rate.date)
                .bind(rate.value_buy)
                .bind(rate.value_sell)
                .bind(rate.created_by.as_deref())
                .execute(&mut *tx)
                .await?;
        }
        PersistMode::Procedure => {
            sqlx::query(CALL_SQL)
                .bind(rate.id)
                .bind(rate.date)
                .bind(rate.value_buy)
                .bind(rate.value_sell)
                .bind(rate.created_by.as_deref())
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    info!("Stored active exchange rate {} for {}", rate.id, rate.date);
    Ok(())
}

async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("failed to close database connection: {}", e);
    }
}
