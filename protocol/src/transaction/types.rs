//! Core value types for payment intents.
//!
//! Amounts are integers in the smallest ledger unit (stroops, 10^-7). No
//! floating point anywhere near money: decimal strings are parsed straight
//! into fixed-point and rejected if they cannot be represented exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{AMOUNT_DECIMALS, MAX_ASSET_CODE_LEN, STROOPS_PER_UNIT};
use crate::crypto::AccountId;

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Asset being paid: the ledger's native currency or an issued credit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The network's native asset (XLM on the public networks).
    Native,
    /// An issued asset, identified by code and issuing account.
    Credit { code: String, issuer: AccountId },
}

impl Asset {
    /// Builds a credit asset, validating the code.
    pub fn credit(code: &str, issuer: AccountId) -> Result<Self, AmountError> {
        if code.is_empty()
            || code.len() > MAX_ASSET_CODE_LEN
            || !code.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AmountError::InvalidAssetCode(code.to_string()));
        }
        Ok(Self::Credit {
            code: code.to_string(),
            issuer,
        })
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    /// Whether the asset code is well formed. `Native` is always valid.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Native => true,
            Self::Credit { code, issuer } => Self::credit(code, *issuer).is_ok(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Credit { code, issuer } => write!(f, "{}:{}", code, issuer),
        }
    }
}

impl FromStr for Asset {
    type Err = AmountError;

    /// Parses `native` or `CODE:ISSUER`, the inverse of `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("native") {
            return Ok(Self::Native);
        }
        let (code, issuer) = s
            .split_once(':')
            .ok_or_else(|| AmountError::InvalidAsset(s.to_string()))?;
        let issuer: AccountId = issuer
            .parse()
            .map_err(|_| AmountError::InvalidAsset(s.to_string()))?;
        Self::credit(code, issuer)
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Reasons a decimal amount or asset cannot be represented on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount {0:?} is not a decimal number")]
    NotANumber(String),

    #[error("amount {0:?} has more than {AMOUNT_DECIMALS} fractional digits")]
    TooPrecise(String),

    #[error("amount {0:?} overflows the fixed-point range")]
    Overflow(String),

    #[error("asset code {0:?} must be 1-12 ASCII alphanumerics")]
    InvalidAssetCode(String),

    #[error("asset {0:?} is not `native` or `CODE:ISSUER`")]
    InvalidAsset(String),
}

/// A fixed-point amount in stroops (1 unit = 10,000,000 stroops).
///
/// Signed because the ledger's wire type is signed; the builder rejects
/// anything that is not strictly positive.
///
/// # Examples
///
/// ```
/// use aidrail_protocol::transaction::Amount;
///
/// let amt: Amount = "15.75".parse().unwrap();
/// assert_eq!(amt.stroops(), 157_500_000);
/// assert_eq!(amt.to_string(), "15.7500000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_stroops(stroops: i64) -> Self {
        Self(stroops)
    }

    /// Whole units, e.g. `Amount::from_units(10)` is 10.0000000.
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(STROOPS_PER_UNIT).map(Self)
    }

    pub fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses a decimal string such as `"10"`, `"15.75"` or `"-0.5"`.
    ///
    /// Zero and negative values parse successfully; positivity is a
    /// builder rule, not a representability rule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(AmountError::NotANumber(s.to_string()));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let overflow = || AmountError::Overflow(s.to_string());

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_value: i64 = if frac.is_empty() {
            0
        } else {
            let scale = 10i64.pow(AMOUNT_DECIMALS - frac.len() as u32);
            frac.parse::<i64>().map_err(|_| overflow())? * scale
        };

        let stroops = whole_value
            .checked_mul(STROOPS_PER_UNIT)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -stroops } else { stroops }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_unit = STROOPS_PER_UNIT as u64;
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            abs / per_unit,
            abs % per_unit,
            width = AMOUNT_DECIMALS as usize
        )
    }
}

// ---------------------------------------------------------------------------
// PaymentOperation
// ---------------------------------------------------------------------------

/// One payment inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOperation {
    pub destination: AccountId,
    pub asset: Asset,
    pub amount: Amount,
}

impl PaymentOperation {
    pub fn new(destination: AccountId, asset: Asset, amount: Amount) -> Self {
        Self {
            destination,
            asset,
            amount,
        }
    }

    /// Native-asset payment.
    pub fn native(destination: AccountId, amount: Amount) -> Self {
        Self::new(destination, Asset::Native, amount)
    }
}
