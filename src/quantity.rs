// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes quantity parsing and comparison.
//!
//! Storage sizes and resource requests arrive as quantity strings (`"10Gi"`,
//! `"1.5G"`, `"500m"`, `"1e3"`). Comparing them as strings is wrong (`"1Gi"` equals
//! `"1024Mi"`), so they are parsed into an exact integer count of milli-units.
//!
//! # Example
//!
//! ```rust
//! use music_operator::quantity::parse_quantity;
//!
//! let a = parse_quantity("1Gi").unwrap();
//! let b = parse_quantity("1024Mi").unwrap();
//! assert_eq!(a, b);
//! assert!(parse_quantity("2Gi").unwrap() > a);
//! ```

use crate::errors::QuantityError;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// A parsed, non-negative quantity in milli-units (sub-milli values round up).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedQuantity {
    millis: u128,
}

impl ParsedQuantity {
    /// Value in milli-units.
    #[must_use]
    pub fn as_millis(&self) -> u128 {
        self.millis
    }
}

/// Parse a Kubernetes quantity string.
///
/// Accepts an optional leading `+`, a decimal number with optional fraction, and one
/// of: no suffix, a binary suffix (`Ki`..`Ei`), a decimal SI suffix (`n`, `u`, `m`,
/// `k`, `M`, `G`, `T`, `P`, `E`) or a decimal exponent (`e3`, `E-2`).
///
/// # Errors
///
/// Returns [`QuantityError`] for empty, negative, unparseable or overflowing input.
pub fn parse_quantity(input: &str) -> Result<ParsedQuantity, QuantityError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(QuantityError::Empty);
    }
    if value.starts_with('-') {
        return Err(QuantityError::Negative {
            value: value.to_string(),
        });
    }
    let unsigned = value.strip_prefix('+').unwrap_or(value);

    let number_end = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_end);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(QuantityError::MissingNumber {
            value: value.to_string(),
        });
    }

    let (binary_power, decimal_exponent) =
        suffix_scale(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
            value: value.to_string(),
            suffix: suffix.to_string(),
        })?;

    let overflow = || QuantityError::Overflow {
        value: value.to_string(),
    };

    let digits = format!("{whole}{fraction}");
    let mantissa: u128 = digits.parse().map_err(|_| overflow())?;
    let fraction_len = i32::try_from(fraction.len()).map_err(|_| overflow())?;

    let scaled = 1024u128
        .checked_pow(binary_power)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(overflow)?;

    // milli-units: shift the decimal exponent by three
    let exponent = decimal_exponent
        .checked_add(3)
        .and_then(|e| e.checked_sub(fraction_len))
        .ok_or_else(overflow)?;
    let millis = if exponent >= 0 {
        10u128
            .checked_pow(exponent.unsigned_abs())
            .and_then(|factor| scaled.checked_mul(factor))
            .ok_or_else(overflow)?
    } else {
        match 10u128.checked_pow(exponent.unsigned_abs()) {
            Some(divisor) => scaled.div_ceil(divisor),
            // the divisor exceeds any representable mantissa
            None => u128::from(scaled > 0),
        }
    };

    Ok(ParsedQuantity { millis })
}

/// Map a suffix to `(power of 1024, power of 10)`.
fn suffix_scale(suffix: &str) -> Option<(u32, i32)> {
    let scale = match suffix {
        "" => (0, 0),
        "Ki" => (1, 0),
        "Mi" => (2, 0),
        "Gi" => (3, 0),
        "Ti" => (4, 0),
        "Pi" => (5, 0),
        "Ei" => (6, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            (0, exponent.parse::<i32>().ok()?)
        }
    };
    Some(scale)
}

/// Compare two quantity strings numerically.
///
/// Falls back to string equality when either side does not parse, so a malformed
/// value is only ever "equal" to the identical string.
#[must_use]
pub fn quantities_equal(a: &str, b: &str) -> bool {
    match (parse_quantity(a), parse_quantity(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Compare two resource lists (`limits` or `requests`) numerically per key.
#[must_use]
pub fn resource_lists_equal(
    a: Option<&BTreeMap<String, Quantity>>,
    b: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.get(key)
                .is_some_and(|other| quantities_equal(&value.0, &other.0))
        })
}

/// Storage request of a claim (or claim template), if declared.
#[must_use]
pub fn storage_request(
    claim: &k8s_openapi::api::core::v1::PersistentVolumeClaim,
) -> Option<&Quantity> {
    claim
        .spec
        .as_ref()?
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get("storage")
}

#[cfg(test)]
#[path = "quantity_tests.rs"]
mod quantity_tests;
