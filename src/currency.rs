use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of currencies an account can hold. Balances are integers in
/// each currency's smallest unit (micros for USD/USDC, gwei-class units for
/// ETH/SOL, satoshis for BTC).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[allow(clippy::upper_case_acronyms)]
pub enum Currency {
    USD,
    USDC,
    ETH,
    BTC,
    SOL,
}

impl Currency {
    /// Client-visible enumeration order.
    pub const ALL: [Currency; 5] = [
        Currency::USD,
        Currency::USDC,
        Currency::ETH,
        Currency::BTC,
        Currency::SOL,
    ];

    /// Smallest units per one whole unit of the currency.
    pub fn unit_factor(self) -> u64 {
        match self {
            Currency::USD | Currency::USDC => 1_000_000,
            Currency::ETH | Currency::SOL => 1_000_000_000,
            Currency::BTC => 100_000_000,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::USDC => "USDC",
            Currency::ETH => "ETH",
            Currency::BTC => "BTC",
            Currency::SOL => "SOL",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::USD),
            "USDC" => Ok(Currency::USDC),
            "ETH" => Ok(Currency::ETH),
            "BTC" => Ok(Currency::BTC),
            "SOL" => Ok(Currency::SOL),
            other => Err(UnsupportedCurrency(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedCurrency(pub String);

impl fmt::Display for UnsupportedCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported currency: {}", self.0)
    }
}

impl std::error::Error for UnsupportedCurrency {}
