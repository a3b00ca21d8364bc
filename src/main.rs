use anyhow::Result;
use chrono::Local;
use clap::Parser;

use tipo_cambio_sync::browser::chromium::ChromiumLauncher;
use tipo_cambio_sync::cli::Args;
use tipo_cambio_sync::config::Config;
use tipo_cambio_sync::fetcher::SunatClient;
use tipo_cambio_sync::pipeline::{self, RunOutcome};
use tipo_cambio_sync::store::PgRateStore;
use tipo_cambio_sync::token::ChallengeTokenAcquirer;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_env();
    let date = args.target_date(Local::now().date_naive())?;

    let launcher = ChromiumLauncher::new(config.browser.clone());
    let acquirer = ChallengeTokenAcquirer::new(launcher, &config.portal);
    let client = SunatClient::new(acquirer, &config.portal)?;
    let store = PgRateStore::new(&config.database);

    match pipeline::run(&client, &store, date, config.created_by.clone()).await? {
        RunOutcome::NotFound { date } => {
            println!("No hay datos para {}", date);
        }
        RunOutcome::Stored { quotation, rate } => {
            println!(
                "Tipo de cambio obtenido: fecha={} compra={} venta={}",
                quotation.date, rate.value_buy, rate.value_sell
            );
            println!("Registro insertado para fecha {}", rate.date);
        }
    }

    Ok(())
}
