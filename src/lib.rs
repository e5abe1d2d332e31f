pub(crate) mod client;
pub(crate) mod core;
pub(crate) mod runner;
pub(crate) mod schemas;
pub(crate) mod session;
pub(crate) mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::client::SomaApiClient;
use crate::core::{config::Settings, telemetry};
use crate::session::SessionDeps;
use crate::store::FileStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let api = Arc::new(SomaApiClient::from_settings(&settings)?);
    let store = Arc::new(FileStore::new(settings.state().dir.clone()));
    let deps = SessionDeps {
        store,
        source: api.clone(),
        registrar: api.clone(),
        checker: api.clone(),
        sink: api,
    };

    tracing::info!(
        quiz_id = %settings.attempt().quiz_id,
        api_base_url = %settings.api().base_url,
        environment = %settings.runtime().environment.as_str(),
        "SOMA exam client starting"
    );

    runner::run(&settings, deps).await
}
