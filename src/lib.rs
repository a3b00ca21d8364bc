pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod exchange_rate;
pub mod fetcher;
pub mod pipeline;
pub mod store;
pub mod tipo_cambio;
pub mod token;

pub use error::{Error, Result};
