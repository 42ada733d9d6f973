pub mod acs;
pub mod api;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod phone;
pub mod provider;
pub mod router;
pub mod server;
