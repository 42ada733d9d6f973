use std::net::SocketAddr;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3001")]
    pub address: SocketAddr,

    #[envconfig(default = "false")]
    pub debug: bool,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,

    #[envconfig(default = "static")]
    pub flag_source: FlagSource,

    /// Comma separated `raw.name=true` pairs, only read by the static source.
    #[envconfig(default = "")]
    pub static_flags: String,

    pub appconfig_endpoint: Option<String>,

    pub appconfig_credential: Option<String>,

    pub appconfig_secret: Option<String>,

    #[envconfig(default = "featureManagement")]
    pub appconfig_namespace: String,

    pub appconfig_label: Option<String>,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "demoFlag1")]
    pub gate_flag: String,

    #[envconfig(default = "What is the answer to everything?")]
    pub content_question: String,

    #[envconfig(default = "42")]
    pub content_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSource {
    Static,
    AppConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseFlagSourceError(String);

impl std::fmt::Display for ParseFlagSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown flag source {:?}, expected static or appconfig", self.0)
    }
}

impl std::error::Error for ParseFlagSourceError {}

impl FromStr for FlagSource {
    type Err = ParseFlagSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(FlagSource::Static),
            "appconfig" => Ok(FlagSource::AppConfig),
            other => Err(ParseFlagSourceError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl std::fmt::Display for ParseEnvMsDurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected a duration in milliseconds")
    }
}

impl std::error::Error for ParseEnvMsDurationError {}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
