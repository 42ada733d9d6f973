use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::acs::AcsSmsProvider;
use crate::api::ProviderError;
use crate::config::Config;
use crate::dispatcher::NotificationDispatcher;
use crate::provider::{PrintProvider, SmsProvider};
use crate::router;

pub fn sms_provider(config: &Config) -> Result<Arc<dyn SmsProvider + Send + Sync>, ProviderError> {
    if config.print_provider {
        Ok(Arc::new(PrintProvider {}))
    } else {
        Ok(Arc::new(AcsSmsProvider::from_config(config)?))
    }
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let provider = match sms_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to create sms provider: {}", e);
            return;
        }
    };

    if config.sms_from_number.is_empty() {
        tracing::warn!("SMS_FROM_NUMBER is not set, the provider will likely reject messages");
    }

    let dispatcher = NotificationDispatcher::new(
        provider,
        config.sms_from_number.clone(),
        config.validate_group_recipients,
    );
    let app = match router::router(Arc::new(dispatcher), config.export_prometheus) {
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
        tracing::error!("sms-sender http server failed: {}", e);
    }
}
