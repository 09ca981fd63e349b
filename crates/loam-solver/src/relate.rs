//! Assignability.
//!
//! `is_assignable_to` decides whether a value of the source type may be
//! stored into a location of the target type. The priority ladder is:
//! identity, the distinguished unknown type, numeric widening and
//! boxing, array covariance (exact match for primitive components),
//! string/dynamic-string interchange, accept-anything targets,
//! char/string interchange, enum-from-string, closure-to-SAM coercion,
//! and placeholder/wildcard bounds, before the ordinary nominal walk.
//!
//! Literal-aware cases (a constant that fits a narrower target, a
//! single-character string into `char`) are the assignment checker's
//! concern — it knows the expression, this module only knows types.

use crate::def::ClassKind;
use crate::hierarchy::as_declared_in;
use crate::types::{PrimitiveKind, TypeData, TypeId};
use crate::widening;
use crate::TypeEnv;

pub fn is_assignable_to(env: &TypeEnv<'_>, source: TypeId, target: TypeId) -> bool {
    assignable(env, source, target, 0)
}

fn assignable(env: &TypeEnv<'_>, source: TypeId, target: TypeId, depth: u32) -> bool {
    if source == target {
        return true;
    }
    if depth > 64 {
        return true;
    }
    let source_data = env.types.lookup(source);
    let target_data = env.types.lookup(target);

    // The unknown-type wildcard matches in both directions.
    if matches!(source_data, TypeData::Unknown) || matches!(target_data, TypeData::Unknown) {
        return true;
    }

    // Primitive / wrapper duality and numeric widening.
    let source_kind = primitive_kind_of(env, source);
    let target_kind = primitive_kind_of(env, target);
    if let Some(t) = target_kind {
        if t == PrimitiveKind::Void {
            return source_kind == Some(PrimitiveKind::Void);
        }
        // Anything is coercible into a primitive boolean condition.
        if t == PrimitiveKind::Boolean && matches!(target_data, TypeData::Primitive(_)) {
            return true;
        }
        if let Some(s) = source_kind {
            if s == t {
                return true;
            }
            if widening::is_widening(s, t) {
                return true;
            }
        }
    }
    if matches!(target_data, TypeData::Primitive(_)) {
        // Reference sources (beyond the matching wrapper handled above)
        // never implicitly narrow into a primitive.
        return false;
    }

    // Numeric sources flow into Number / BigDecimal / BigInteger.
    if let Some(s) = source_kind {
        if widening::is_numeric(s) {
            if let TypeData::Named { class, .. } = target_data {
                if class == env.store.builtins.big_decimal_class
                    || class == env.store.builtins.number_class
                {
                    return true;
                }
                if class == env.store.builtins.big_integer_class
                    && widening::numeric_rank(s).is_some_and(|r| r <= 3)
                {
                    return true;
                }
            }
        }
    }

    // Arrays: primitive components require exact match, reference
    // components are covariant.
    if let (TypeData::Array { component: sc }, TypeData::Array { component: tc }) =
        (&source_data, &target_data)
    {
        let sc_prim = matches!(env.types.lookup(*sc), TypeData::Primitive(_));
        let tc_prim = matches!(env.types.lookup(*tc), TypeData::Primitive(_));
        if sc_prim || tc_prim {
            return sc == tc;
        }
        return assignable(env, *sc, *tc, depth + 1);
    }

    // String and dynamic string are mutually compatible.
    if let TypeData::Named { class: tc, .. } = target_data {
        let b = &env.store.builtins;
        let source_class = source_data.named_class();
        if (tc == b.string_class && source_class == Some(b.gstring_class))
            || (tc == b.gstring_class && source_class == Some(b.string_class))
        {
            return true;
        }

        // Accept-anything target.
        if tc == b.object_class {
            return source_kind != Some(PrimitiveKind::Void);
        }

        // A char goes where a string is expected.
        if (tc == b.string_class || tc == b.gstring_class || tc == b.char_sequence_class)
            && source_kind == Some(PrimitiveKind::Char)
        {
            return true;
        }

        // Enum targets accept string sources (implicit valueOf).
        if env.store.class(tc).kind == ClassKind::Enum
            && matches!(source_class, Some(c) if c == b.string_class || c == b.gstring_class)
        {
            return true;
        }
    }

    // Closures coerce to SAM targets and to the Closure class itself.
    if let TypeData::Closure { params, .. } = &source_data {
        if let TypeData::Named { class, .. } = target_data {
            if class == env.store.builtins.closure_class {
                return true;
            }
            if let Some(sam) = env.store.sam_method(class) {
                return match params {
                    None => true,
                    Some(ps) => {
                        ps.len() == sam.params.len()
                            || (ps.is_empty() && sam.params.len() == 1)
                    }
                };
            }
        }
    }

    // Placeholder / wildcard bounds.
    match &target_data {
        TypeData::Placeholder { upper, .. } => {
            return upper.iter().all(|&u| assignable(env, source, u, depth + 1));
        }
        TypeData::Wildcard { upper, lower } => {
            if let Some(l) = lower {
                return assignable(env, *l, source, depth + 1);
            }
            return upper.iter().all(|&u| assignable(env, source, u, depth + 1));
        }
        _ => {}
    }
    if let TypeData::Placeholder { upper, .. } = &source_data {
        let bound = upper.first().copied().unwrap_or(env.store.builtins.object);
        return assignable(env, bound, target, depth + 1);
    }

    // Ordinary nominal subtyping, re-expressed in the target's class so
    // generics arguments line up.
    if let TypeData::Named {
        class: target_class,
        args: target_args,
    } = &target_data
    {
        let source = boxed_id(env, source, &source_data);
        if let Some(reexpressed) = as_declared_in(env, source, *target_class) {
            if target_args.is_empty() {
                return true;
            }
            if let TypeData::Named { args: source_args, .. } = env.types.lookup(reexpressed) {
                if source_args.is_empty() {
                    // Raw source into parameterized target: permitted,
                    // flagged as unchecked by the caller.
                    return true;
                }
                return source_args
                    .iter()
                    .zip(target_args.iter())
                    .all(|(&s, &t)| arg_compatible(env, s, t, depth + 1));
            }
            return true;
        }
    }

    false
}

/// Generics-argument compatibility: identity, or assignability of the
/// usage argument into the declared argument (wildcards and unbound
/// placeholders fall out of the bounds rules in `assignable`).
fn arg_compatible(env: &TypeEnv<'_>, source: TypeId, target: TypeId, depth: u32) -> bool {
    source == target || assignable(env, source, target, depth)
}

fn boxed_id(env: &TypeEnv<'_>, ty: TypeId, data: &TypeData) -> TypeId {
    match data {
        TypeData::Primitive(kind) => env.store.builtins.wrapper(*kind),
        _ => ty,
    }
}

/// The primitive kind of a type, unboxing wrapper classes.
pub fn primitive_kind_of(env: &TypeEnv<'_>, ty: TypeId) -> Option<PrimitiveKind> {
    match env.types.lookup(ty) {
        TypeData::Primitive(kind) => Some(kind),
        TypeData::Named { class, .. } => env.store.builtins.unboxed(class),
        _ => None,
    }
}

/// A parameterized-class usage with no arguments supplied (erasure in
/// effect). Drives the `UncheckedGenerics` informational diagnostic.
pub fn is_raw_usage(env: &TypeEnv<'_>, ty: TypeId) -> bool {
    match env.types.lookup(ty) {
        TypeData::Named { class, args } => {
            args.is_empty() && !env.store.class(class).type_params.is_empty()
        }
        _ => false,
    }
}
