//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Extracts request data
//! 2. Validates input
//! 3. Calls the appropriate service
//! 4. Returns a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "INSUFFICIENT_FUNDS",
//!         "message": "Insufficient funds: balance 70.00, requested debit 100.00"
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{CardRecord, OrderStatus};
use crate::db::queries;
use crate::error::CoreError;
use crate::models::{
    AdjustBalanceRequest, ApiResponse, CardResponse, CreateCardRequest, CreateOrderRequest,
    HealthResponse, OrderResponse, PayinRequest, QuoteRequest, QuoteResponse,
};
use crate::services::QuoteSubmission;
use crate::AppState;

/// Build the error response for a failed operation.
fn error_response(err: &CoreError) -> HttpResponse {
    HttpResponse::build(err.http_status()).json(ApiResponse::<serde_json::Value>::error(
        err.code(),
        &err.to_string(),
    ))
}

/// API information endpoint (root).
///
/// Returns information about available API endpoints.
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "Crypto Card API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Backend API for crypto-card balances and exchanges",
        "endpoints": {
            "health": {
                "method": "GET",
                "path": "/health",
                "description": "Health check endpoint"
            },
            "exchange": {
                "quote": {
                    "method": "POST",
                    "path": "/exchange/quote",
                    "description": "Price an exchange against the rate oracle"
                },
                "createOrder": {
                    "method": "POST",
                    "path": "/exchange/orders",
                    "description": "Create an order from an accepted quote"
                },
                "getOrder": {
                    "method": "GET",
                    "path": "/exchange/orders/{id}",
                    "description": "Order status snapshot"
                },
                "payin": {
                    "method": "POST",
                    "path": "/exchange/orders/{id}/payin",
                    "description": "Pay-in signal from the payment observer"
                }
            },
            "regulator": {
                "adjustBalance": {
                    "method": "POST",
                    "path": "/regulator/adjust-balance",
                    "description": "Privileged direct balance adjustment"
                }
            },
            "cards": {
                "create": {
                    "method": "POST",
                    "path": "/cards",
                    "description": "Create a card (derives a receive address for crypto kinds)"
                },
                "get": {
                    "method": "GET",
                    "path": "/cards/{id}",
                    "description": "Card snapshot with recent ledger entries"
                }
            }
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Example
///
/// ```bash
/// curl http://127.0.0.1:8080/health
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_healthy = state.db.pool().get().await.is_ok();

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    let status_code = if db_healthy {
        actix_web::http::StatusCode::OK
    } else {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status_code).json(ApiResponse::success(response))
}

/// Price an exchange.
///
/// Calls the rate oracle and returns an advisory quote. No order is
/// created and no funds move.
///
/// ## Endpoint
///
/// `POST /exchange/quote`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/exchange/quote \
///   -H "Content-Type: application/json" \
///   -d '{"fromCurrency": "btc", "toCurrency": "eth", "fromAmount": "1.0"}'
/// ```
pub async fn create_quote(
    state: web::Data<Arc<AppState>>,
    body: web::Json<QuoteRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    let timeout = Duration::from_millis(state.config.rate_oracle_timeout_ms);

    match state
        .exchange
        .quote(
            request.from_currency,
            request.to_currency,
            request.from_amount,
            timeout,
        )
        .await
    {
        Ok(quote) => HttpResponse::Ok().json(ApiResponse::success(QuoteResponse::from(quote))),
        Err(e) => error_response(&e),
    }
}

/// Create an exchange order from an accepted quote.
///
/// The order starts in QUOTED; no debit is taken until settlement.
///
/// ## Endpoint
///
/// `POST /exchange/orders`
pub async fn create_order(
    state: web::Data<Arc<AppState>>,
    body: web::Json<CreateOrderRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    let submission = QuoteSubmission {
        from_currency: request.quote.from_currency,
        to_currency: request.quote.to_currency,
        from_amount: request.quote.from_amount,
        rate: request.quote.rate,
        expires_at: request.quote.expires_at,
    };

    match state
        .exchange
        .create_order(
            request.owner_id,
            submission,
            request.source_card_id,
            request.destination_address,
        )
        .await
    {
        Ok(order) => HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(order))),
        Err(e) => error_response(&e),
    }
}

/// Get an order status snapshot.
///
/// ## Endpoint
///
/// `GET /exchange/orders/{id}`
pub async fn get_order(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match state.exchange.get_order(path.into_inner()).await {
        Ok(order) => HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(order))),
        Err(e) => error_response(&e),
    }
}

/// Record a pay-in observation from the payment/chain observer.
///
/// Once the order reaches CONFIRMING, settlement is attempted in the
/// same request. A settlement hiccup (say, the oracle is briefly
/// unreachable on a re-price) leaves the order in CONFIRMING and the
/// next observer signal retries it.
///
/// ## Endpoint
///
/// `POST /exchange/orders/{id}/payin`
pub async fn payin_signal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
    body: web::Json<PayinRequest>,
) -> HttpResponse {
    let order_id = path.into_inner();
    let request = body.into_inner();

    let order = match state
        .exchange
        .mark_payin_received(order_id, request.observed_amount, request.confirmations)
        .await
    {
        Ok(order) => order,
        Err(e) => return error_response(&e),
    };

    if order.status != OrderStatus::Confirming {
        return HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(order)));
    }

    match state.exchange.settle(order_id).await {
        Ok(settled) => HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(settled))),
        Err(e @ CoreError::SettlementFailed { .. }) => error_response(&e),
        Err(e) => {
            warn!(
                "Order {} confirmed but settlement deferred: {}",
                order_id, e
            );
            HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(order)))
        }
    }
}

/// Apply a privileged balance adjustment.
///
/// ## Authorization
///
/// The upstream authorization layer verifies the regulator capability
/// before the request reaches this handler; `actorId` arrives
/// pre-verified.
///
/// ## Endpoint
///
/// `POST /regulator/adjust-balance`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/regulator/adjust-balance \
///   -H "Content-Type: application/json" \
///   -d '{"actorId": 7, "cardId": "...", "amount": "30.00", "operation": "subtract"}'
/// ```
pub async fn adjust_balance(
    state: web::Data<Arc<AppState>>,
    body: web::Json<AdjustBalanceRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    match state
        .regulator
        .adjust(
            request.actor_id,
            request.card_id,
            request.amount,
            request.operation,
        )
        .await
    {
        Ok(card) => {
            HttpResponse::Ok().json(ApiResponse::success(CardResponse::from_record(card, vec![])))
        }
        Err(e) => error_response(&e),
    }
}

/// Create a card.
///
/// Crypto-kind cards get their receive address derived and persisted
/// synchronously, exactly once; fiat cards never carry one.
///
/// ## Endpoint
///
/// `POST /cards`
pub async fn create_card(
    state: web::Data<Arc<AppState>>,
    body: web::Json<CreateCardRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    let receive_address = if request.currency_kind.is_crypto() {
        match state.deriver.derive(request.owner_id, request.currency_kind) {
            Ok(address) => Some(address),
            Err(e) => return error_response(&e),
        }
    } else {
        if request.owner_id <= 0 {
            return error_response(&CoreError::InvalidInput(format!(
                "owner_id must be positive, got {}",
                request.owner_id
            )));
        }
        None
    };

    let now = Utc::now();
    let card = CardRecord {
        id: Uuid::new_v4(),
        owner_id: request.owner_id,
        currency_kind: request.currency_kind,
        balance: rust_decimal::Decimal::ZERO,
        receive_address,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::create_card(state.db.pool(), &card).await {
        return error_response(&e.into());
    }

    info!(
        "Card {} created for owner {} ({})",
        card.id, card.owner_id, card.currency_kind
    );

    HttpResponse::Ok().json(ApiResponse::success(CardResponse::from_record(card, vec![])))
}

/// Get a card snapshot with its recent ledger entries.
///
/// ## Endpoint
///
/// `GET /cards/{id}`
pub async fn get_card(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let card_id = path.into_inner();

    let mut card = match queries::get_card(state.db.pool(), card_id).await {
        Ok(Some(card)) => card,
        Ok(None) => {
            return error_response(&CoreError::NotFound(format!("card {}", card_id)));
        }
        Err(e) => return error_response(&e.into()),
    };

    // Backfill: a crypto card predating address derivation gets its
    // address derived and persisted here, once.
    if card.currency_kind.is_crypto() && card.receive_address.is_none() {
        let address = match state.deriver.derive(card.owner_id, card.currency_kind) {
            Ok(address) => address,
            Err(e) => return error_response(&e),
        };
        if let Err(e) = queries::set_receive_address(state.db.pool(), card_id, &address).await {
            return error_response(&e.into());
        }
        info!("Backfilled receive address for card {}", card_id);
        card.receive_address = Some(address);
    }

    // Balance reads go through the ledger so the snapshot reflects
    // every committed apply.
    card.balance = match state.ledger.get_balance(card_id).await {
        Ok(balance) => balance,
        Err(e) => return error_response(&e),
    };

    let entries = match queries::get_card_ledger_entries(state.db.pool(), card_id, 20, 0).await {
        Ok(entries) => entries,
        Err(e) => return error_response(&e.into()),
    };

    HttpResponse::Ok().json(ApiResponse::success(CardResponse::from_record(card, entries)))
}
