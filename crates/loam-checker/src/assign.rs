//! Assignment compatibility.
//!
//! The solver's `is_assignable_to` knows only types; this layer also
//! knows the right-hand expression, which unlocks the literal-aware
//! rules: constants that fit a narrower numeric target, single-character
//! strings into `char`, list literals coerced through a constructor or
//! element-wise, and map literals matched against settable properties.
//!
//! Verdicts are data. The driver consults the extension hooks before
//! turning a failing verdict into a diagnostic.

use crate::symbols::{find_constructors, find_settable};
use crate::methods::{choose_method, Resolution};
use loam_common::Atom;
use loam_hir::{ExprId, ExprKind, Module};
use loam_solver::widening::literal_fits;
use loam_solver::{
    is_assignable_to, is_raw_usage, primitive_kind_of, ClassId, PrimitiveKind, TypeData, TypeEnv,
    TypeId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignVerdict {
    Ok,
    /// Compatible only because generics are erased at this use site.
    OkUnchecked,
    /// A numeric constant (or wider numeric value) that may not fit.
    PrecisionLoss,
    Incompatible,
    /// A map-literal entry named a property the target does not have.
    NoSuchProperty(Atom),
}

impl AssignVerdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, AssignVerdict::Ok | AssignVerdict::OkUnchecked)
    }
}

/// Decide whether `rhs_ty` (the type of `rhs`, when a concrete
/// expression is at hand) may be stored into `target`. `from` is the
/// class whose code performs the assignment, for visibility checks.
pub fn assignment_verdict(
    env: &TypeEnv<'_>,
    module: &Module,
    target: TypeId,
    rhs: Option<ExprId>,
    rhs_ty: TypeId,
    from: Option<ClassId>,
) -> AssignVerdict {
    if let Some(expr) = rhs {
        if let Some(verdict) = literal_verdict(env, module, target, expr, rhs_ty, from) {
            return verdict;
        }
    }
    plain_verdict(env, target, rhs_ty)
}

fn plain_verdict(env: &TypeEnv<'_>, target: TypeId, rhs_ty: TypeId) -> AssignVerdict {
    if is_assignable_to(env, rhs_ty, target) {
        if unchecked_generics(env, target, rhs_ty) {
            return AssignVerdict::OkUnchecked;
        }
        return AssignVerdict::Ok;
    }
    // A numeric value flowing into a narrower numeric slot is a
    // precision problem, not a type mismatch.
    if let (Some(s), Some(t)) = (primitive_kind_of(env, rhs_ty), primitive_kind_of(env, target)) {
        if loam_solver::widening::is_widening(t, s) && s != t {
            return AssignVerdict::PrecisionLoss;
        }
    }
    AssignVerdict::Incompatible
}

fn literal_verdict(
    env: &TypeEnv<'_>,
    module: &Module,
    target: TypeId,
    expr: ExprId,
    rhs_ty: TypeId,
    from: Option<ClassId>,
) -> Option<AssignVerdict> {
    let target_kind = primitive_kind_of(env, target);
    match &module.arena.expr(expr).kind {
        // Null never fits a primitive slot.
        ExprKind::NullLit => {
            if matches!(env.types.lookup(target), TypeData::Primitive(_)) {
                Some(AssignVerdict::Incompatible)
            } else {
                Some(AssignVerdict::Ok)
            }
        }
        // An integer constant fits a narrower target when its value does.
        ExprKind::IntLit(value) | ExprKind::LongLit(value) => {
            let kind = target_kind?;
            match kind {
                PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Long => Some(if literal_fits(*value, kind) {
                    AssignVerdict::Ok
                } else {
                    AssignVerdict::PrecisionLoss
                }),
                PrimitiveKind::Float | PrimitiveKind::Double => Some(AssignVerdict::Ok),
                _ => None,
            }
        }
        // A single-character string literal is a char.
        ExprKind::StringLit(atom) => {
            if target_kind == Some(PrimitiveKind::Char) {
                let text = env.interner.resolve(*atom);
                Some(if text.chars().count() == 1 {
                    AssignVerdict::Ok
                } else {
                    AssignVerdict::Incompatible
                })
            } else {
                None
            }
        }
        // A unary-negated constant behaves like the constant.
        ExprKind::Unary {
            op: loam_hir::UnOp::Neg,
            operand,
        } => match &module.arena.expr(*operand).kind {
            ExprKind::IntLit(v) | ExprKind::LongLit(v) => {
                let kind = target_kind?;
                match kind {
                    PrimitiveKind::Byte
                    | PrimitiveKind::Short
                    | PrimitiveKind::Char
                    | PrimitiveKind::Int
                    | PrimitiveKind::Long => Some(if literal_fits(-*v, kind) {
                        AssignVerdict::Ok
                    } else {
                        AssignVerdict::PrecisionLoss
                    }),
                    PrimitiveKind::Float | PrimitiveKind::Double => Some(AssignVerdict::Ok),
                    _ => None,
                }
            }
            _ => None,
        },
        ExprKind::ListLit(elements) => {
            Some(list_literal_verdict(env, module, target, elements, from))
        }
        ExprKind::MapLit(entries) => map_literal_verdict(env, module, target, entries, from),
        _ => None,
    }
}

/// A list literal flows into arrays and collections element-wise, or
/// into any class with a matching constructor.
fn list_literal_verdict(
    env: &TypeEnv<'_>,
    module: &Module,
    target: TypeId,
    elements: &[ExprId],
    from: Option<ClassId>,
) -> AssignVerdict {
    match env.types.lookup(target) {
        TypeData::Array { component } => {
            elementwise(env, module, component, elements, from)
        }
        TypeData::Named { class, args } => {
            let b = &env.store.builtins;
            let collection_like = class == b.list_class
                || class == b.collection_class
                || class == b.iterable_class
                || class == b.object_class;
            if collection_like {
                let component = args.first().copied().unwrap_or(loam_solver::TypeInterner::UNKNOWN);
                return elementwise(env, module, component, elements, from);
            }
            // Constructor coercion: `[a, b] as C` semantics for a
            // declared target type.
            let ctors = find_constructors(env, class, from);
            let mut arg_types = Vec::with_capacity(elements.len());
            for _ in elements {
                arg_types.push(loam_solver::TypeInterner::UNKNOWN);
            }
            match choose_method(env, target, &ctors, &arg_types) {
                Resolution::Unique(_) => AssignVerdict::Ok,
                _ => AssignVerdict::Incompatible,
            }
        }
        TypeData::Unknown => AssignVerdict::Ok,
        _ => AssignVerdict::Incompatible,
    }
}

fn elementwise(
    env: &TypeEnv<'_>,
    module: &Module,
    component: TypeId,
    elements: &[ExprId],
    from: Option<ClassId>,
) -> AssignVerdict {
    if matches!(env.types.lookup(component), TypeData::Unknown) {
        return AssignVerdict::Ok;
    }
    let mut unchecked = false;
    for &element in elements {
        // Nested literals are judged by shape; other expressions were
        // typed by the driver before this point.
        let verdict = assignment_verdict(
            env,
            module,
            component,
            Some(element),
            loam_solver::TypeInterner::UNKNOWN,
            from,
        );
        match verdict {
            AssignVerdict::Ok => {}
            AssignVerdict::OkUnchecked => unchecked = true,
            other => return other,
        }
    }
    if unchecked {
        AssignVerdict::OkUnchecked
    } else {
        AssignVerdict::Ok
    }
}

/// A map literal with string keys assigns into a class target through
/// its settable properties, entry by entry.
fn map_literal_verdict(
    env: &TypeEnv<'_>,
    module: &Module,
    target: TypeId,
    entries: &[(ExprId, ExprId)],
    from: Option<ClassId>,
) -> Option<AssignVerdict> {
    let TypeData::Named { class, .. } = env.types.lookup(target) else {
        return None;
    };
    let b = &env.store.builtins;
    if class == b.map_class || class == b.object_class {
        return Some(AssignVerdict::Ok);
    }
    for (key, value) in entries {
        let ExprKind::StringLit(name) = &module.arena.expr(*key).kind else {
            continue;
        };
        let Some(slot) = find_settable(env, target, *name, from) else {
            return Some(AssignVerdict::NoSuchProperty(*name));
        };
        let verdict = assignment_verdict(
            env,
            module,
            slot,
            Some(*value),
            loam_solver::TypeInterner::UNKNOWN,
            from,
        );
        if !verdict.is_ok() {
            return Some(verdict);
        }
    }
    Some(AssignVerdict::Ok)
}

/// Generics erasure in effect: a raw usage on either side of an
/// otherwise-parameterized assignment.
fn unchecked_generics(env: &TypeEnv<'_>, target: TypeId, rhs_ty: TypeId) -> bool {
    let raw_source = is_raw_usage(env, rhs_ty);
    let raw_target = is_raw_usage(env, target);
    if raw_source == raw_target {
        return false;
    }
    let target_class = env.types.lookup(target).named_class();
    let source_class = env.types.lookup(rhs_ty).named_class();
    match (source_class, target_class) {
        (Some(_), Some(tc)) => !env.store.class(tc).type_params.is_empty() || raw_source,
        _ => false,
    }
}
