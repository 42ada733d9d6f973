use std::net::SocketAddr;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3002")]
    pub address: SocketAddr,

    #[envconfig(default = "false")]
    pub debug: bool,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,

    #[envconfig(default = "false")]
    pub print_provider: bool,

    #[envconfig(default = "https://localhost")]
    pub sms_endpoint: String,

    #[envconfig(default = "")]
    pub sms_access_key: String,

    #[envconfig(default = "")]
    pub sms_from_number: String,

    #[envconfig(default = "2021-03-07")]
    pub sms_api_version: String,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    /// Normalize group recipients before the batch call, like single sends do.
    #[envconfig(default = "true")]
    pub validate_group_recipients: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert!(config.validate_group_recipients);
        assert!(!config.print_provider);
        assert_eq!(config.sms_api_version, "2021-03-07");
        assert_eq!(config.request_timeout.0, time::Duration::from_millis(5000));
    }

    #[test]
    fn rejects_invalid_timeouts() {
        let env = HashMap::from([("REQUEST_TIMEOUT".to_string(), "soon".to_string())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }
}
