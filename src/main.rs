//! # Crypto Card Backend Service
//!
//! This is the main entry point for the backend service that manages
//! crypto-card balances for the wallet mini-app. It provides:
//!
//! - REST API for quotes, exchange orders, cards and regulator actions
//! - An append-only balance ledger with atomic per-card applies
//! - Deterministic receive-address derivation for crypto cards
//! - Background maintenance (order expiry sweep, minted-asset dedup)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌─────────────────┐           ┌─────────────────────────────┐  │
//! │  │    REST API     │           │     Background Services     │  │
//! │  │    (Actix)      │           │  • Order expiry sweep       │  │
//! │  │                 │           │  • Minted-asset dedup pass  │  │
//! │  │  /exchange/*    │           └─────────────────────────────┘  │
//! │  │  /regulator/*   │                         │                  │
//! │  │  /cards/*       │                         │                  │
//! │  └────────┬────────┘                         │                  │
//! │           │                                  │                  │
//! │  ┌────────┴──────────────────────────────────┴───────────────┐  │
//! │  │                      SERVICE LAYER                         │  │
//! │  │  ┌──────────────┐ ┌───────────────┐ ┌──────────────────┐  │  │
//! │  │  │BalanceLedger │ │ExchangeOrder  │ │ AddressDeriver   │  │  │
//! │  │  │              │ │Machine        │ │                  │  │  │
//! │  │  └──────────────┘ └───────────────┘ └──────────────────┘  │  │
//! │  └────────────────────────────┬───────────────────────────────┘ │
//! │                               │                                  │
//! │         ┌─────────────────────┴──────────┐                      │
//! │         │                                │                       │
//! │  ┌──────┴──────┐                  ┌──────┴──────┐               │
//! │  │  PostgreSQL │                  │ Rate Oracle │               │
//! │  │  Database   │                  │   (HTTP)    │               │
//! │  └─────────────┘                  └─────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Copy `.env.example` to `.env` and configure
//! 3. Start the server: `cargo run`
//!
//! ## Environment Variables
//!
//! See `config/mod.rs` for all required configuration.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod config;
mod db;
mod error;
mod models;
mod oracle;
mod services;
mod utils;

use config::AppConfig;
use db::Database;
use oracle::{HttpRateOracle, RateOracle};
use services::{
    AddressDeriver, AssetDeduplicator, BalanceLedger, ExchangeOrderMachine, RegulatorAdjustment,
};

/// Application state shared across all handlers.
///
/// This struct contains all the shared resources that API handlers
/// and background services need access to.
pub struct AppState {
    /// Database connection pool for PostgreSQL
    pub db: Database,

    /// Receive-address derivation
    pub deriver: AddressDeriver,

    /// The balance ledger
    pub ledger: BalanceLedger,

    /// Exchange order state machine
    pub exchange: ExchangeOrderMachine,

    /// Regulator adjustment service
    pub regulator: RegulatorAdjustment,

    /// Application configuration
    pub config: AppConfig,
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Loads configuration from environment
/// 2. Initializes database connection
/// 3. Wires up the services
/// 4. Starts background maintenance tasks
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("🚀 Starting Crypto Card Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env().expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Rate oracle: {}", config.rate_oracle_url);
    info!("   Quote TTL: {}s", config.quote_ttl_secs);

    // =========================================
    // STEP 3: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    info!("🗄️  Database connected");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    info!("📦 Database migrations complete");

    // =========================================
    // STEP 4: Initialize Services
    // =========================================
    let oracle: Arc<dyn RateOracle> = Arc::new(HttpRateOracle::new(&config.rate_oracle_url));
    let deriver = AddressDeriver::new(config.address_derivation_secret.clone());
    let ledger = BalanceLedger::new(db.clone());
    let exchange = ExchangeOrderMachine::new(
        db.clone(),
        oracle.clone(),
        deriver.clone(),
        config.clone(),
    );
    let regulator = RegulatorAdjustment::new(db.clone(), ledger.clone());
    let deduplicator = AssetDeduplicator::new(db.clone(), config.clone());

    info!("🔧 Services initialized");

    // =========================================
    // STEP 5: Create Application State
    // =========================================
    let app_state = Arc::new(AppState {
        db: db.clone(),
        deriver,
        ledger,
        exchange: exchange.clone(),
        regulator,
        config: config.clone(),
    });

    // =========================================
    // STEP 6: Start Background Services
    // =========================================
    let sweep = exchange.clone();
    tokio::spawn(async move {
        sweep.start_expiry_sweep().await;
    });

    info!("⏲️  Order expiry sweep started");

    tokio::spawn(async move {
        deduplicator.start_dedup_loop().await;
    });

    info!("🧹 Minted-asset dedup loop started");

    // =========================================
    // STEP 7: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))
            // The mini-app front end is served from another origin
            .wrap(Cors::permissive())
            // Add logging middleware
            .wrap(middleware::Logger::default())
            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
