pub mod api;
pub mod appconfig;
pub mod config;
pub mod flag_name;
pub mod handlers;
pub mod provider;
pub mod router;
pub mod server;
pub mod snapshot;
