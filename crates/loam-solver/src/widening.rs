//! Numeric widening and promotion.
//!
//! The six numeric primitive kinds form a total widening order
//! byte < short < int < long < float < double. Narrowing is never an
//! implicit conversion; a compile-time constant that fits the target is
//! the only exception, decided by the caller via `literal_fits`.

use crate::types::PrimitiveKind;

/// Widening rank. `None` for boolean/char/void.
pub fn numeric_rank(kind: PrimitiveKind) -> Option<u8> {
    match kind {
        PrimitiveKind::Byte => Some(0),
        PrimitiveKind::Short => Some(1),
        PrimitiveKind::Int => Some(2),
        PrimitiveKind::Long => Some(3),
        PrimitiveKind::Float => Some(4),
        PrimitiveKind::Double => Some(5),
        _ => None,
    }
}

pub fn is_numeric(kind: PrimitiveKind) -> bool {
    numeric_rank(kind).is_some()
}

/// `from` widens (or is identical) to `to`.
pub fn is_widening(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    match (numeric_rank(from), numeric_rank(to)) {
        (Some(a), Some(b)) => a <= b,
        _ => false,
    }
}

/// Binary numeric promotion: the wider of the two ranks, never below int.
pub fn promote(a: PrimitiveKind, b: PrimitiveKind) -> Option<PrimitiveKind> {
    const ORDER: [PrimitiveKind; 6] = [
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];
    let ra = numeric_rank(a)?;
    let rb = numeric_rank(b)?;
    let rank = ra.max(rb).max(2);
    Some(ORDER[rank as usize])
}

/// Whether an integer literal value fits the narrower target without
/// loss. Used for constant-aware narrowing.
pub fn literal_fits(value: i64, target: PrimitiveKind) -> bool {
    match target {
        PrimitiveKind::Byte => i8::try_from(value).is_ok(),
        PrimitiveKind::Short => i16::try_from(value).is_ok(),
        PrimitiveKind::Char => u16::try_from(value).is_ok(),
        PrimitiveKind::Int => i32::try_from(value).is_ok(),
        PrimitiveKind::Long | PrimitiveKind::Float | PrimitiveKind::Double => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC: [PrimitiveKind; 6] = [
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    #[test]
    fn widening_is_a_total_order() {
        for (i, a) in NUMERIC.iter().enumerate() {
            for (j, b) in NUMERIC.iter().enumerate() {
                assert_eq!(is_widening(*a, *b), i <= j, "{a:?} -> {b:?}");
            }
        }
    }

    #[test]
    fn widening_is_reflexive() {
        for kind in NUMERIC {
            assert!(is_widening(kind, kind));
        }
    }

    #[test]
    fn boolean_never_widens() {
        assert!(!is_widening(PrimitiveKind::Boolean, PrimitiveKind::Int));
        assert!(!is_widening(PrimitiveKind::Int, PrimitiveKind::Boolean));
    }

    #[test]
    fn promotion_floors_at_int() {
        assert_eq!(
            promote(PrimitiveKind::Byte, PrimitiveKind::Short),
            Some(PrimitiveKind::Int)
        );
        assert_eq!(
            promote(PrimitiveKind::Int, PrimitiveKind::Double),
            Some(PrimitiveKind::Double)
        );
    }

    #[test]
    fn literal_fit_checks_bounds() {
        assert!(literal_fits(127, PrimitiveKind::Byte));
        assert!(!literal_fits(128, PrimitiveKind::Byte));
        assert!(literal_fits(65_535, PrimitiveKind::Char));
        assert!(!literal_fits(-1, PrimitiveKind::Char));
    }
}
