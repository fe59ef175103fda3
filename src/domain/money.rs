use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only currency the ledger settles in.
pub const CURRENCY: &str = "USD";

/// Upper bound for any single fiat amount the engine will accept.
const MAX_FIAT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// A validated fiat amount: positive, at most two fraction digits, bounded.
///
/// Amounts cross the payment-gateway boundary as strings and must compare
/// exactly, so rendering is normalized to two fraction digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
pub struct FiatAmount(Decimal);

impl FiatAmount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(
                "amount must be positive".to_string(),
            ));
        }
        if value.scale() > 2 {
            return Err(LedgerError::InvalidArgument(
                "amount must have at most 2 fractional digits".to_string(),
            ));
        }
        if value > MAX_FIAT {
            return Err(LedgerError::InvalidArgument(format!(
                "amount exceeds maximum of {MAX_FIAT}"
            )));
        }
        Ok(Self(value))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| LedgerError::InvalidArgument(format!("malformed amount: {s:?}")))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A purchasable token bundle with its fixed price.
#[derive(Debug, Clone, Copy)]
pub struct TokenPackage {
    pub tokens: u64,
    pub price: &'static str,
}

/// Fixed catalog of purchasable token packages, price in [`CURRENCY`].
pub const TOKEN_PACKAGES: [TokenPackage; 5] = [
    TokenPackage { tokens: 100, price: "4.99" },
    TokenPackage { tokens: 250, price: "9.99" },
    TokenPackage { tokens: 500, price: "17.99" },
    TokenPackage { tokens: 1000, price: "29.99" },
    TokenPackage { tokens: 2500, price: "59.99" },
];

/// Resolves a requested package size against the catalog.
pub fn package_for_tokens(tokens: u64) -> Result<TokenPackage> {
    TOKEN_PACKAGES
        .iter()
        .find(|p| p.tokens == tokens)
        .copied()
        .ok_or_else(|| LedgerError::InvalidArgument(format!("no token package of size {tokens}")))
}

/// Resolves a captured order amount back to the catalog package it paid for.
/// Amounts are compared as exact strings, the same way the gateway reports them.
pub fn package_for_price(amount: &str, currency: &str) -> Result<TokenPackage> {
    if currency != CURRENCY {
        return Err(LedgerError::FailedPrecondition(format!(
            "unsupported currency {currency:?}"
        )));
    }
    TOKEN_PACKAGES
        .iter()
        .find(|p| p.price == amount)
        .copied()
        .ok_or_else(|| {
            LedgerError::FailedPrecondition(format!(
                "order amount {amount} does not match any token package"
            ))
        })
}

const TIP_MIN: &str = "1.00";
const TIP_MAX: &str = "500.00";

/// Validates a tip amount string: well formed and within `[1.00, 500.00]`.
pub fn validate_tip_amount(s: &str) -> Result<FiatAmount> {
    let amount = FiatAmount::parse(s)?;
    let min = FiatAmount::parse(TIP_MIN)?;
    let max = FiatAmount::parse(TIP_MAX)?;
    if amount < min || amount > max {
        return Err(LedgerError::InvalidArgument(format!(
            "tip must be between {TIP_MIN} and {TIP_MAX}"
        )));
    }
    Ok(amount)
}

/// Largest token count a single trade may move.
pub const MAX_TRADE_TOKENS: u64 = 100_000;

/// Validates a peer-transfer token count.
pub fn validate_trade_tokens(tokens: u64) -> Result<u64> {
    if tokens == 0 {
        return Err(LedgerError::InvalidArgument(
            "trade amount must be positive".to_string(),
        ));
    }
    if tokens > MAX_TRADE_TOKENS {
        return Err(LedgerError::InvalidArgument(format!(
            "trade amount exceeds maximum of {MAX_TRADE_TOKENS}"
        )));
    }
    Ok(tokens)
}
