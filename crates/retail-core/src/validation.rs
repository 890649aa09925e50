//! # Validation Module
//!
//! Input validation for every request that reaches the ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractor                                               │
//! │  └── Json<T> rejects bodies that do not deserialize                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field rules (required, lengths, ranges, formats)                  │
//! │  └── Runs before any transaction is opened                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (client_txn_id, checkout_request_id, email)                │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use retail_core::validation::{normalize_phone, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_TRANSFER_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects a blank value for `field`.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use retail_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Coca-Cola 500ml").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates a brand name (at most 100 characters).
pub fn validate_brand(brand: &str) -> ValidationResult<()> {
    validate_text("brand", brand, 100)
}

/// Validates a branch name (at most 100 characters).
pub fn validate_branch_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 100)
}

/// Validates a branch location (at most 200 characters).
pub fn validate_location(location: &str) -> ValidationResult<()> {
    validate_text("location", location, 200)
}

/// Validates a person's display name.
pub fn validate_person_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 100)
}

/// Validates an email address.
///
/// ## Rules
/// - One `@` with a non-empty local part
/// - Domain contains a dot that is neither first nor last
/// - No whitespace
///
/// ## Example
/// ```rust
/// use retail_core::validation::validate_email;
///
/// assert!(validate_email("admin@example.com").is_ok());
/// assert!(validate_email("admin@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }
    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let invalid = || ValidationError::invalid_format("email", "must be a valid email address");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < domain.len() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates a password (at least 6 characters).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    if password.chars().count() < 6 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        });
    }
    Ok(())
}

/// Normalises a Kenyan mobile number to the gateway's `2547XXXXXXXX` form.
///
/// ## Accepted Inputs
/// ```text
/// 0712345678      → 254712345678
/// +254712345678   → 254712345678
/// 254712345678    → 254712345678
/// 0112345678      → 254112345678   (01x numbers)
/// ```
/// Spaces and dashes are ignored.
pub fn normalize_phone(raw: &str) -> ValidationResult<String> {
    let digits: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::required("phone"));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("phone", "must contain digits only"));
    }

    let national = if let Some(rest) = digits.strip_prefix("254") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest.to_string()
    } else {
        digits
    };

    if national.len() != 9 || !(national.starts_with('7') || national.starts_with('1')) {
        return Err(ValidationError::invalid_format(
            "phone",
            "must be a Kenyan mobile number like 0712345678 or 254712345678",
        ));
    }

    Ok(format!("254{}", national))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale or order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an HQ→branch transfer quantity.
pub fn validate_transfer_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_TRANSFER_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_TRANSFER_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an absolute stock quantity set by an admin (>= 0).
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a price in cents.
///
/// ## Example
/// ```rust
/// use retail_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(6_500).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a sale, order or bulk restock.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("items"));
    }

    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Coca-Cola 500ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@example.com").is_ok());
        assert!(validate_email("a.b+c@shop.co.ke").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
        assert!(validate_email("a@example.").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(ValidationError::TooShort { min: 6, .. })
        ));
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0712 345-678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0112345678").unwrap(), "254112345678");

        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("07123").is_err());
        assert!(normalize_phone("0812345678").is_err());
        assert!(normalize_phone("07abc45678").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_transfer_quantity() {
        assert!(validate_transfer_quantity(30).is_ok());
        assert!(validate_transfer_quantity(5_000).is_ok());
        assert!(validate_transfer_quantity(0).is_err());
        assert!(validate_transfer_quantity(MAX_TRANSFER_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(-1).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(MAX_LINE_ITEMS + 1).is_err());
    }
}
