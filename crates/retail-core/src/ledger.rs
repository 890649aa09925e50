//! # Ledger Math
//!
//! Pure arithmetic and classification rules used by the sale, order and
//! offline-sync processors.
//!
//! ## Price Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where a line's unit price comes from                 │
//! │                                                                         │
//! │  Online sale / order          Offline sync record                      │
//! │  ───────────────────          ───────────────────                      │
//! │  LineRequest {                LineRequest {                            │
//! │    unit_price: None             unit_price: Some(client price)         │
//! │  }                            }                                        │
//! │       │                             │                                  │
//! │       ▼                             ▼                                  │
//! │  live Product.price_cents     client price kept as-is                  │
//! │                                     │                                  │
//! │                                     ▼                                  │
//! │                               verify_total(reported, Σ lines)          │
//! │                               mismatch → TotalMismatch                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::SaleStatus;

/// One requested line before stock and price are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Caller-supplied unit price (offline replay). `None` means "use the
    /// live product price".
    pub unit_price: Option<Money>,
}

impl LineRequest {
    /// A line priced from the live catalog.
    pub fn live(product_id: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
            unit_price: None,
        }
    }

    /// A line carrying the client's own price.
    pub fn client_priced(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

/// A line after stock was taken and the price resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Computes `unit_price × quantity`, rejecting overflow.
///
/// ## Example
/// ```rust
/// use retail_core::ledger::line_total;
/// use retail_core::money::Money;
///
/// assert_eq!(line_total(Money::from_cents(250), 4).unwrap().cents(), 1000);
/// ```
pub fn line_total(unit_price: Money, quantity: i64) -> CoreResult<Money> {
    unit_price.checked_multiply_quantity(quantity).ok_or_else(|| {
        ValidationError::OutOfRange {
            field: "line total".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into()
    })
}

/// Sums line totals, rejecting overflow.
pub fn sum_lines<'a, I>(lines: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = &'a PricedLine>,
{
    lines.into_iter().try_fold(Money::zero(), |acc, line| {
        acc.checked_add(line.line_total).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into()
        })
    })
}

/// Checks a client-reported total against the recomputed one.
///
/// ## Example
/// ```rust
/// use retail_core::ledger::verify_total;
/// use retail_core::money::Money;
///
/// assert!(verify_total(Money::from_cents(100), Money::from_cents(100)).is_ok());
/// assert!(verify_total(Money::from_cents(100), Money::from_cents(99)).is_err());
/// ```
pub fn verify_total(reported: Money, computed: Money) -> CoreResult<()> {
    if reported != computed {
        return Err(CoreError::TotalMismatch {
            reported: reported.cents(),
            computed: computed.cents(),
        });
    }
    Ok(())
}

/// Initial sale status for an offline record from its reported payment
/// status: `completed` → paid, `failed` → failed, anything else → pending.
pub fn sale_status_from_payment_report(reported: Option<&str>) -> SaleStatus {
    match reported.map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "completed" => SaleStatus::Paid,
        Some(s) if s == "failed" => SaleStatus::Failed,
        _ => SaleStatus::Pending,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(total: i64) -> PricedLine {
        PricedLine {
            product_id: "P".to_string(),
            product_name: "Coke 500ml".to_string(),
            brand: "Coke".to_string(),
            quantity: 1,
            unit_price: Money::from_cents(total),
            line_total: Money::from_cents(total),
        }
    }

    #[test]
    fn test_line_total_overflow_is_rejected() {
        let err = line_total(Money::from_cents(i64::MAX), 2).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_sum_lines() {
        let lines = vec![priced(500), priced(1250)];
        assert_eq!(sum_lines(&lines).unwrap().cents(), 1750);
        assert_eq!(sum_lines(&Vec::<PricedLine>::new()).unwrap(), Money::zero());
    }

    #[test]
    fn test_verify_total_reports_both_sides() {
        match verify_total(Money::from_cents(1000), Money::from_cents(900)) {
            Err(CoreError::TotalMismatch { reported, computed }) => {
                assert_eq!(reported, 1000);
                assert_eq!(computed, 900);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sale_status_from_payment_report() {
        assert_eq!(sale_status_from_payment_report(Some("completed")), SaleStatus::Paid);
        assert_eq!(sale_status_from_payment_report(Some("FAILED")), SaleStatus::Failed);
        assert_eq!(sale_status_from_payment_report(Some("queued")), SaleStatus::Pending);
        assert_eq!(sale_status_from_payment_report(None), SaleStatus::Pending);
    }
}
