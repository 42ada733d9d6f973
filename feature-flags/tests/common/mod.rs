use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::header::CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use feature_flags::config::{Config, EnvMsDuration, FlagSource};
use feature_flags::server::serve;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    address: SocketAddr::from_str("127.0.0.1:0").unwrap(),
    debug: false,
    export_prometheus: false,
    flag_source: FlagSource::Static,
    static_flags: "featureManagement.demoFlag1=true,featureManagement.demoFlag2=false".to_string(),
    appconfig_endpoint: None,
    appconfig_credential: None,
    appconfig_secret: None,
    appconfig_namespace: "featureManagement".to_string(),
    appconfig_label: None,
    request_timeout: EnvMsDuration(Duration::from_secs(5)),
    gate_flag: "demoFlag1".to_string(),
    content_question: "What is the answer to everything?".to_string(),
    content_answer: "42".to_string(),
});

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
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

    pub async fn get(&self, path: &str) -> reqwest::Response {
        let client = reqwest::Client::new();
        client
            .get(format!("http://{:?}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn put_override(&self, name: &str, enabled: bool) -> reqwest::Response {
        let client = reqwest::Client::new();
        client
            .put(format!("http://{:?}/flags/{}", self.addr, name))
            .body(format!(r#"{{"enabled": {}}}"#, enabled))
            .header(CONTENT_TYPE, "application/json")
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
