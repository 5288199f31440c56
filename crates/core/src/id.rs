//! Strongly-typed identifiers used across the domain.
//!
//! Every entity in the back office is keyed by a store-assigned positive
//! integer, so identifiers wrap `i64` rather than UUIDs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a catalog product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

/// Identifier of a user (actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a stock ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without checking it (store rows, tests).
            pub const fn from_raw(value: i64) -> Self {
                Self(value)
            }

            /// Wrap a caller-supplied value, rejecting non-positive ids.
            pub fn parse(value: i64) -> Result<Self, DomainError> {
                if value <= 0 {
                    return Err(DomainError::validation(format!(
                        "{} must be a positive integer",
                        $name
                    )));
                }
                Ok(Self(value))
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))?;
                Self::parse(raw)
            }
        }
    };
}

impl_int_newtype!(ProductId, "productId");
impl_int_newtype!(UserId, "userId");
impl_int_newtype!(MovementId, "movementId");
