//! # Money Helpers
//!
//! Conversion between decimal prices and minor currency units (cents).
//! The catalog stores decimal prices; Stripe wants integer minor units.

/// Convert a decimal price to minor currency units, rounding to the
/// nearest cent. `14.99` becomes `1499`.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Convert minor currency units back to a decimal amount.
pub fn from_minor_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Sum of `unit_amount × quantity` over line items, expressed as a
/// decimal. This is the locally computed order total.
///
/// Note: `price_at_purchase` on order items snapshots the unrounded
/// product price, while this total is built from rounded minor units.
/// For non-integer-cent prices the two can diverge by fractions of a
/// cent; that mirrors the authoritative behavior and is left as-is
/// rather than reconciled here.
pub fn order_total(items: impl IntoIterator<Item = (i64, u32)>) -> f64 {
    let minor: i64 = items
        .into_iter()
        .map(|(unit_amount, quantity)| unit_amount * quantity as i64)
        .sum();
    from_minor_units(minor)
}
