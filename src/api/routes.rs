//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// This function is called from main.rs to set up
/// all the endpoint routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                      GET  - Health check
/// ├── /exchange
/// │   ├── /quote                   POST - Price an exchange
/// │   └── /orders                  POST - Create an order
/// │       ├── /{id}                GET  - Order status snapshot
/// │       └── /{id}/payin          POST - Observer pay-in signal
/// ├── /regulator
/// │   └── /adjust-balance          POST - Privileged adjustment
/// └── /cards                       POST - Create a card
///     └── /{id}                    GET  - Card snapshot
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))
        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))
        // Exchange endpoints
        .service(
            web::scope("/exchange")
                // Price an exchange against the rate oracle
                .route("/quote", web::post().to(handlers::create_quote))
                // Create an order from an accepted quote
                .route("/orders", web::post().to(handlers::create_order))
                // Order status snapshot
                .route("/orders/{id}", web::get().to(handlers::get_order))
                // Pay-in signal from the payment/chain observer
                .route(
                    "/orders/{id}/payin",
                    web::post().to(handlers::payin_signal),
                ),
        )
        // Regulator endpoints
        .service(
            web::scope("/regulator")
                // Privileged direct balance adjustment
                .route(
                    "/adjust-balance",
                    web::post().to(handlers::adjust_balance),
                ),
        )
        // Card endpoints
        .service(
            web::scope("/cards")
                // Create a card (derives the receive address for
                // crypto kinds)
                .route("", web::post().to(handlers::create_card))
                // Card snapshot with recent ledger entries
                .route("/{id}", web::get().to(handlers::get_card)),
        );
}
