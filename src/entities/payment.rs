//! Payment record - money received from a student. Append-only.

use super::{ids, timestamp};
use crate::errors::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(deserialize_with = "ids::one")]
    pub student_id: i64,
    pub amount: f64,
    pub method: String,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
}

/// Parses a user-entered payment amount.
///
/// # Errors
/// Returns [`Error::Validation`] if the text is not a finite number or is negative.
pub fn parse_amount(raw: &str) -> Result<f64> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::validation("Amount must be a number."))?;
    check_amount(amount)
}

/// Rejects NaN, infinite and negative amounts.
pub fn check_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() {
        return Err(Error::validation("Amount must be a number."));
    }
    if amount < 0.0 {
        return Err(Error::validation("Amount cannot be negative."));
    }
    Ok(amount)
}
