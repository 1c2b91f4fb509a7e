//! Money rounding and the serde helpers used for every monetary field.
//!
//! Amounts are [`BigDecimal`] values rounded to [`MONEY_SCALE`] places with
//! [`RoundingMode::HalfUp`]. Every finalized amount is rounded before it takes
//! part in a further sum, so totals are sums of rounded parts.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{Error, ErrorKind};

/// Number of decimal places kept for currency amounts (paise).
pub const MONEY_SCALE: i64 = 2;

/// Round `amount` to two decimal places, ties away from zero.
///
/// # Example
/// ```rust
/// use std::str::FromStr;
/// use bigdecimal::BigDecimal;
/// use gst_invoice::round_money;
///
/// let rounded = round_money(&BigDecimal::from_str("2.675").unwrap());
/// assert_eq!(rounded.to_string(), "2.68");
/// ```
pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    let rounded = amount.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp);
    // zero comes back without a scale
    if rounded == BigDecimal::from(0) {
        BigDecimal::new(0.into(), MONEY_SCALE)
    } else {
        rounded.with_scale(MONEY_SCALE)
    }
}

/// Convert a float into a decimal using its shortest round-trip representation, so `0.1`
/// becomes exactly `0.1`.
///
/// # Errors
/// [`ErrorKind::NonFiniteAmount`] for NaN and infinities.
pub fn money_from_f64(amount: f64) -> Result<BigDecimal, Error> {
    if !amount.is_finite() {
        return Err(Error::from(ErrorKind::NonFiniteAmount(amount)));
    }
    BigDecimal::from_str(&amount.to_string()).map_err(|e| Error::from(format!("{e:?}")))
}

/// [`money_from_f64`] followed by [`round_money`].
pub fn round_money_f64(amount: f64) -> Result<BigDecimal, Error> {
    Ok(round_money(&money_from_f64(amount)?))
}

pub fn serialize_bigdecimal<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// Amounts arrive either as decimal strings (the form we write) or as plain JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(f64),
}

fn parse_raw_amount<E>(raw: RawAmount) -> Result<BigDecimal, E>
where
    E: serde::de::Error,
{
    match raw {
        RawAmount::Text(s) => BigDecimal::from_str(s.trim()).map_err(E::custom),
        RawAmount::Number(n) => money_from_f64(n).map_err(E::custom),
    }
}

pub fn deserialize_bigdecimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    parse_raw_amount(RawAmount::deserialize(deserializer)?)
}

pub fn serialize_optional_bigdecimal<S>(
    value: &Option<BigDecimal>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize_optional_bigdecimal<'de, D>(
    deserializer: D,
) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawAmount>::deserialize(deserializer)?
        .map(parse_raw_amount)
        .transpose()
}
