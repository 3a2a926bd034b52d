//! # API Module
//!
//! REST boundary of the backend: route configuration and the handler
//! functions behind each endpoint.

pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
