pub mod api;
pub mod auth;
pub mod cli_adapter;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod reconciler;
pub mod render;
pub mod routes;
pub mod session;
pub mod types;
pub mod workspace;
pub mod ws_adapter;
