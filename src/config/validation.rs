//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every URL and socket address parses
//! - Validate value ranges (timeouts > 0, retries ≥ 1, positive fee floors)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::chain::types::Currency;
use crate::config::schema::ClientConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: String, value: &str) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme {}", parsed.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL {}: {}", value, e))),
    }
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.counterparty.url.is_empty() {
        check_url(&mut errors, "counterparty.url".into(), &config.counterparty.url);
    }
    if config.counterparty.timeout_secs == 0 {
        errors.push(ValidationError::new("counterparty.timeout_secs", "must be greater than 0"));
    }

    for currency in [Currency::Btc, Currency::Liquid] {
        let section = match currency {
            Currency::Btc => "btc",
            Currency::Liquid => "liquid",
        };
        let currency_config = config.currency(currency);
        for (i, source) in currency_config.sources.iter().enumerate() {
            check_url(&mut errors, format!("{}.sources[{}].url", section, i), &source.url);
        }
        if let Some(floor) = currency_config.fee_floor {
            if floor.is_nan() || floor <= 0.0 {
                errors.push(ValidationError::new(format!("{}.fee_floor", section), "must be positive"));
            }
        }
    }

    let onchain = &config.onchain;
    if onchain.retry_attempts == 0 {
        errors.push(ValidationError::new("onchain.retry_attempts", "must be at least 1"));
    }
    if onchain.source_timeout_secs == 0 {
        errors.push(ValidationError::new("onchain.source_timeout_secs", "must be greater than 0"));
    }
    if onchain.block_poll_secs == Some(0) {
        errors.push(ValidationError::new("onchain.block_poll_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if !matches!(
        observability.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {}", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {}", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
