//! Conversion of big integer balances into floats used for sorting and aggregations

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_traits::{ToPrimitive, Zero};

use crate::core::error::ConversionError;

/// Decimals kept for native balances
const NUM_DECIMALS_IN_FLOAT_BALANCE: i32 = 10;
/// Decimals kept for token values
const NUM_DECIMALS_IN_FLOAT_BALANCE_ESDT: i32 = 18;
/// Largest accepted value, in bytes of its big-endian representation
pub const MAX_ESDT_VALUE_LENGTH: usize = 100;

/// Converts balances expressed in the smallest unit into denominated floats
#[derive(Debug, Clone)]
pub struct BalanceConverter {
    divider_for_denomination: f64,
    balance_precision: f64,
    balance_precision_esdt: f64,
}

impl BalanceConverter {
    pub fn new(denomination: i32) -> Result<Self, ConversionError> {
        if denomination < 0 {
            return Err(ConversionError::NegativeDenomination);
        }

        Ok(Self {
            divider_for_denomination: 10f64.powi(denomination),
            balance_precision: 10f64.powi(NUM_DECIMALS_IN_FLOAT_BALANCE),
            balance_precision_esdt: 10f64.powi(NUM_DECIMALS_IN_FLOAT_BALANCE_ESDT),
        })
    }

    /// Native balance as float, rounded to 10 decimals
    pub fn compute_balance_as_float(&self, balance: &str) -> Result<f64, ConversionError> {
        self.compute(balance, self.balance_precision)
    }

    /// Token value as float, rounded to 18 decimals
    pub fn convert_big_value_to_float(&self, value: &str) -> Result<f64, ConversionError> {
        self.compute(value, self.balance_precision_esdt)
    }

    fn compute(&self, balance: &str, precision: f64) -> Result<f64, ConversionError> {
        if balance.is_empty() {
            return Ok(0.0);
        }

        let value = BigDecimal::from_str(balance)
            .map_err(|_| ConversionError::InvalidBigValue(balance.to_string()))?;
        if value.is_zero() {
            return Ok(0.0);
        }

        let (digits, _) = value.as_bigint_and_exponent();
        let (_, bytes) = digits.to_bytes_be();
        if bytes.len() > MAX_ESDT_VALUE_LENGTH {
            return Err(ConversionError::ValueTooBig);
        }

        let as_float = value.to_f64().ok_or(ConversionError::ValueTooBig)?;
        let denominated = as_float / self.divider_for_denomination;
        let rounded = ((denominated * precision).round() / precision).max(0.0);
        if rounded.is_infinite() {
            return Err(ConversionError::ValueTooBig);
        }

        Ok(rounded)
    }
}
