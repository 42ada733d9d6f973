use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use sms_sender::config::{Config, EnvMsDuration};
use sms_sender::server::serve;

pub const FROM_NUMBER: &str = "+18005550100";

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    address: SocketAddr::from_str("127.0.0.1:0").unwrap(),
    debug: false,
    export_prometheus: false,
    print_provider: false,
    sms_endpoint: "https://localhost".to_string(),
    // base64 of "secret"
    sms_access_key: "c2VjcmV0".to_string(),
    sms_from_number: FROM_NUMBER.to_string(),
    sms_api_version: "2021-03-07".to_string(),
    request_timeout: EnvMsDuration(Duration::from_secs(5)),
    validate_group_recipients: true,
});

/// Default config, sending through the given mock provider.
pub fn config_for(provider: &MockServer) -> Config {
    Config {
        sms_endpoint: provider.base_url(),
        ..DEFAULT_CONFIG.clone()
    }
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, listener, async move { notify.notified().await }).await
        });
        ServerHandle { addr, shutdown }
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> reqwest::Response {
        let client = reqwest::Client::new();
        client
            .get(format!("http://{:?}{}", self.addr, path))
            .query(query)
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
