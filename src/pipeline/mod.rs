//! Change-detection and notification pipeline.
//!
//! - `detect`: diff a fetched snapshot against the stored one
//! - `classify`: name a seat transition
//! - `policy`: decide per subscriber whether to notify
//! - `dedup`: suppress repeated sends within a run
//! - `dispatch`: fan out across channels
//! - `run`: drive a whole run in batches

pub mod classify;
pub mod dedup;
pub mod detect;
pub mod dispatch;
pub mod policy;
pub mod run;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use run::{Collaborators, run_once};

use crate::error::Result;
use crate::models::{Config, RunRecord};
use crate::services::{Alerter, ChannelSet, HowdyFetcher, alert};
use crate::storage;
use crate::utils::http::create_async_client;

/// Build the production collaborators from `config` and run once for `term`.
///
/// Startup failures (HTTP client, state store) are reported through the
/// alerter before being returned.
pub async fn run_with_config(config: &Config, term: &str) -> Result<RunRecord> {
    let client = create_async_client(&config.http)?;
    let alerter: Arc<dyn Alerter> = Arc::from(alert::from_config(&config.alert, &client));

    let store = match storage::open(&config.storage, term).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Could not open state store: {e}");
            alerter.alert(term, &e.to_string()).await;
            return Err(e);
        }
    };

    let collaborators = Collaborators {
        store,
        fetcher: Arc::new(HowdyFetcher::new(client.clone(), term, &config.fetcher)),
        channels: ChannelSet::from_config(&config.channels, &client),
        alerter,
    };

    run_once(term, collaborators, config).await
}
