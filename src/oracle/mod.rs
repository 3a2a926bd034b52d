//! # Rate Oracle Module
//!
//! The exchange machine prices orders against an external rate oracle.
//! The oracle is consumed through the [`RateOracle`] trait so the
//! transport can be swapped (HTTP in production, a stub in tests).
//!
//! ## Failure Model
//!
//! The oracle is assumed to fail transiently. Callers wrap each round
//! trip in their own timeout; every error variant here is surfaced to
//! the exchange machine as a rate-unavailable condition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::db::models::CurrencyKind;

/// Errors from a rate oracle round trip.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Transport-level failure (connect, TLS, timeout at the client).
    #[error("Oracle request failed: {0}")]
    Http(String),

    /// The oracle answered with a non-success status.
    #[error("Oracle returned status {0}")]
    Status(u16),

    /// The oracle's payload could not be interpreted.
    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// A rate observation from the oracle.
#[derive(Debug, Clone)]
pub struct RateQuote {
    /// Units of the target currency per unit of the source currency.
    pub rate: Decimal,

    /// When the oracle observed this rate.
    pub timestamp: DateTime<Utc>,
}

/// A source of exchange rates.
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Fetch the current rate for converting `from` into `to`.
    async fn get_rate(
        &self,
        from: CurrencyKind,
        to: CurrencyKind,
    ) -> Result<RateQuote, OracleError>;
}

/// Wire format of the oracle's rate endpoint.
#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: Decimal,
    timestamp: DateTime<Utc>,
}

/// HTTP implementation of [`RateOracle`].
///
/// Answers are fetched from `GET {base}/rate?from=btc&to=eth`.
///
/// ## Usage
///
/// ```rust,ignore
/// let oracle = HttpRateOracle::new("https://rates.example.com");
/// let quote = oracle.get_rate(CurrencyKind::Btc, CurrencyKind::Eth).await?;
/// ```
pub struct HttpRateOracle {
    /// Shared HTTP client.
    client: reqwest::Client,

    /// Oracle base URL, no trailing slash.
    base_url: String,
}

impl HttpRateOracle {
    /// Create a new oracle client against the given base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateOracle for HttpRateOracle {
    async fn get_rate(
        &self,
        from: CurrencyKind,
        to: CurrencyKind,
    ) -> Result<RateQuote, OracleError> {
        let url = format!(
            "{}/rate?from={}&to={}",
            self.base_url,
            from.as_str(),
            to.as_str()
        );
        debug!("Fetching rate: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Status(response.status().as_u16()));
        }

        let body: RateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        if body.rate <= Decimal::ZERO {
            return Err(OracleError::InvalidResponse(format!(
                "non-positive rate {}",
                body.rate
            )));
        }

        Ok(RateQuote {
            rate: body.rate,
            timestamp: body.timestamp,
        })
    }
}
