//! Integer money arithmetic.
//!
//! All monetary amounts in the system are integer **minor currency units**
//! (cents and their equivalents); floats never touch money. Tax rates are
//! stored as integer basis points and cross the wire as a two-decimal
//! percentage (`10.00` = 10%, 1000 basis points).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// ISO-style 3-letter currency code (e.g. `EUR`, `USD`).
///
/// One currency per order, fixed by the owning restaurant; amounts are
/// serialized as an integer minor amount plus this code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, DomainError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "currency code must be 3 ASCII letters, got '{code}'"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for CurrencyCode {}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl core::str::FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tax rate in integer basis points (1000 = 10.00%).
///
/// The wire form is a decimal percentage with two decimals; internally all
/// tax math stays in integer arithmetic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxRate(u32);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(0);

    /// Build from basis points (hundredths of a percent). Max 100%.
    pub fn from_basis_points(bp: u32) -> Result<Self, DomainError> {
        if bp > 10_000 {
            return Err(DomainError::validation(format!(
                "tax rate cannot exceed 100% ({bp} basis points)"
            )));
        }
        Ok(Self(bp))
    }

    /// Build from a whole percentage (e.g. `10` = 10%).
    pub fn from_percent(percent: u32) -> Result<Self, DomainError> {
        Self::from_basis_points(percent.saturating_mul(100))
    }

    pub fn basis_points(self) -> u32 {
        self.0
    }

    /// The two-decimal percentage form used on the wire.
    pub fn as_percent(self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl ValueObject for TaxRate {}

impl TryFrom<Decimal> for TaxRate {
    type Error = DomainError;

    fn try_from(percent: Decimal) -> Result<Self, Self::Error> {
        if percent.is_sign_negative() {
            return Err(DomainError::validation("tax rate cannot be negative"));
        }
        let basis_points = percent * Decimal::from(100u32);
        if !basis_points.fract().is_zero() {
            return Err(DomainError::validation(format!(
                "tax rate supports at most two decimals, got '{percent}'"
            )));
        }
        let bp = basis_points
            .to_u32()
            .ok_or_else(|| DomainError::validation(format!("tax rate out of range: '{percent}'")))?;
        Self::from_basis_points(bp)
    }
}

impl From<TaxRate> for Decimal {
    fn from(value: TaxRate) -> Self {
        value.as_percent()
    }
}

impl core::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.as_percent())
    }
}

/// Net amount for one line: `unit_price × quantity`, in minor units.
pub fn line_net_minor(unit_price_minor: i64, quantity: u32) -> i64 {
    unit_price_minor * i64::from(quantity)
}

/// Tax for one line, rounded half-up, in minor units.
///
/// Computed per line (not on the order total) so carts mixing tax rates
/// never accumulate rounding drift.
pub fn line_tax_minor(net_minor: i64, rate: TaxRate) -> i64 {
    let bp = i128::from(rate.basis_points());
    let tax = (i128::from(net_minor) * bp + 5_000) / 10_000;
    tax as i64
}
