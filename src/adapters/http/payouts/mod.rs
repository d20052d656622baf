//! Payout HTTP module: DTOs, handlers, and routes.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::payout_routes;
