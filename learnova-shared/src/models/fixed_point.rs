/// Two-place decimal output for `NUMERIC(5, 2)` columns
///
/// Postgres returns a stored `0.00` as a decimal with no scale, so values
/// are rescaled before serialization. Use with
/// `#[serde(serialize_with = "crate::models::fixed_point::serialize")]`.

use rust_decimal::Decimal;
use serde::Serializer;

/// `value` rounded and padded to exactly two decimal places
pub fn two_places(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&two_places(*value))
}

pub fn serialize_option<S: Serializer>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serialize(value, serializer),
        None => serializer.serialize_none(),
    }
}
