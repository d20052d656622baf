//! Webhook HTTP module: handlers and routes.

pub mod handlers;
pub mod routes;

pub use routes::webhook_routes;
