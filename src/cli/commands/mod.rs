pub mod collect;
pub mod config;
pub mod law;
pub mod news;
pub mod portal;
pub mod speech;
pub mod stats;

use crate::config::Config;
use crate::error::Result;
use crate::facade::Retriever;

/// Configuration plus a retriever built from it
fn setup() -> Result<(Config, Retriever)> {
    let config = Config::load()?;
    let retriever = Retriever::from_config(&config)?;
    Ok((config, retriever))
}
