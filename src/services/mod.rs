//! # Services Module
//!
//! This module contains the core business logic services for the
//! crypto-card backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `AddressDeriver` | Deterministic receive-address derivation |
//! | `BalanceLedger` | Append-only balance ledger, atomic applies |
//! | `ExchangeOrderMachine` | Exchange lifecycle, quote to settlement |
//! | `AssetDeduplicator` | Minted-asset duplicate collapse |
//! | `RegulatorAdjustment` | Privileged audited balance mutation |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌────────────────────┐        ┌──────────────────────────┐     │
//! │  │ RegulatorAdjustment│        │   ExchangeOrderMachine   │     │
//! │  │  • adjust()        │        │  • quote()  • settle()   │     │
//! │  └─────────┬──────────┘        └──────┬───────────┬───────┘     │
//! │            │                          │           │             │
//! │            ▼                          ▼           ▼             │
//! │  ┌──────────────────────────────────────┐  ┌──────────────┐    │
//! │  │            BalanceLedger              │  │AddressDeriver│    │
//! │  │  • apply()  • get_balance()           │  │  • derive()  │    │
//! │  └──────────────────────────────────────┘  └──────────────┘    │
//! │                                                                  │
//! │  ┌──────────────────────────────────────┐                       │
//! │  │   AssetDeduplicator (maintenance)    │                       │
//! │  │  • run_pass()                        │                       │
//! │  └──────────────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod address_deriver;
pub mod deduplicator;
pub mod exchange;
pub mod ledger;
pub mod regulator;

pub use address_deriver::AddressDeriver;
pub use deduplicator::{AssetDeduplicator, DedupReport};
pub use exchange::{ExchangeOrderMachine, Quote, QuoteSubmission};
pub use ledger::BalanceLedger;
pub use regulator::{AdjustOperation, RegulatorAdjustment};
