use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::FlagError;
use crate::appconfig::AppConfigFlagProvider;
use crate::config::{Config, FlagSource};
use crate::handlers::DemoContent;
use crate::provider::{FlagProvider, StaticFlagProvider};
use crate::router;
use crate::snapshot::FeatureFlagSnapshot;

pub fn flag_provider(config: &Config) -> Result<Arc<dyn FlagProvider + Send + Sync>, FlagError> {
    Ok(match config.flag_source {
        FlagSource::Static => Arc::new(config.static_flags.parse::<StaticFlagProvider>()?),
        FlagSource::AppConfig => Arc::new(AppConfigFlagProvider::from_config(config)?),
    })
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let provider = match flag_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to create flag provider for {:?}: {}", config.flag_source, e);
            return;
        }
    };

    // The only provider round-trip of the process: flags are served from this snapshot
    // until restart.
    let snapshot = match FeatureFlagSnapshot::build(provider.as_ref()).await {
        Ok(snapshot) => Arc::new(snapshot),
        Err(e) => {
            tracing::error!("Failed to build feature flag snapshot: {}", e);
            return;
        }
    };

    let content = DemoContent {
        question: config.content_question.clone(),
        answer: config.content_answer.clone(),
    };
    let app = match router::router(
        snapshot,
        content,
        &config.gate_flag,
        config.export_prometheus,
    ) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to install metrics recorder: {}", e);
            return;
        }
    };

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("listening on an unknown address: {}", e),
    }

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("feature-flags http server failed: {}", e);
    }
}
