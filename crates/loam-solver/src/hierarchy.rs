//! Nominal hierarchy walks: supertype enumeration, inheritance
//! re-expression, and distance measurements used by overload scoring.

use crate::def::ClassId;
use crate::types::{TypeData, TypeId};
use crate::unify::{GenericsBindings, apply_bindings};
use crate::TypeEnv;
use rustc_hash::FxHashSet;

/// Direct supertypes of a type, superclass first, then interfaces, with
/// the class's generics arguments substituted through. Raw usages of a
/// generic class erase their supertypes to raw as well.
pub fn direct_supertypes(env: &TypeEnv<'_>, ty: TypeId) -> Vec<TypeId> {
    match env.types.lookup(ty) {
        TypeData::Named { class, args } => {
            let info = env.store.class(class);
            let mut result = Vec::new();
            let raw = !info.type_params.is_empty() && args.len() != info.type_params.len();
            let bindings = if raw {
                None
            } else {
                let mut b = GenericsBindings::new();
                for (param, arg) in info.type_params.iter().zip(args.iter()) {
                    b.bind_unchecked(param.name, *arg, true);
                }
                Some(b)
            };
            let mut push = |result: &mut Vec<TypeId>, sup: TypeId| {
                let sup = match &bindings {
                    Some(b) => apply_bindings(env, b, sup),
                    None => erase_to_raw(env, sup),
                };
                result.push(sup);
            };
            if let Some(sup) = info.superclass {
                push(&mut result, sup);
            } else if class != env.store.builtins.object_class && !info.is_interface() {
                result.push(env.store.builtins.object);
            }
            for &iface in &info.interfaces {
                push(&mut result, iface);
            }
            // An interface with no declared supers still erases to Object.
            if info.is_interface() && info.interfaces.is_empty() {
                result.push(env.store.builtins.object);
            }
            result
        }
        TypeData::Array { .. } => vec![env.store.builtins.object],
        TypeData::Closure { .. } => vec![
            env.types.named(env.store.builtins.closure_class),
            env.store.builtins.object,
        ],
        TypeData::Placeholder { upper, .. } => {
            if upper.is_empty() {
                vec![env.store.builtins.object]
            } else {
                upper.to_vec()
            }
        }
        TypeData::Wildcard { upper, .. } => {
            if upper.is_empty() {
                vec![env.store.builtins.object]
            } else {
                upper.to_vec()
            }
        }
        TypeData::Primitive(_) | TypeData::Unknown => Vec::new(),
    }
}

/// All supertypes in breadth order (classes before interfaces at each
/// level), excluding the type itself. Deduplicated by class identity.
pub fn supertypes_bfs(env: &TypeEnv<'_>, ty: TypeId) -> Vec<TypeId> {
    let mut result = Vec::new();
    let mut seen: FxHashSet<ClassId> = FxHashSet::default();
    if let Some(c) = env.types.lookup(ty).named_class() {
        seen.insert(c);
    }
    let mut frontier = vec![ty];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for current in frontier {
            for sup in direct_supertypes(env, current) {
                let class = env.types.lookup(sup).named_class();
                if let Some(c) = class {
                    if !seen.insert(c) {
                        continue;
                    }
                }
                result.push(sup);
                next.push(sup);
            }
        }
        frontier = next;
    }
    result
}

/// Erase a type to its raw form: generics arguments stripped,
/// placeholders and wildcards collapsed to their upper bound (or Object).
pub fn erase_to_raw(env: &TypeEnv<'_>, ty: TypeId) -> TypeId {
    match env.types.lookup(ty) {
        TypeData::Named { class, args } if !args.is_empty() => env.types.named(class),
        TypeData::Placeholder { upper, .. } | TypeData::Wildcard { upper, .. } => upper
            .first()
            .map(|&u| erase_to_raw(env, u))
            .unwrap_or(env.store.builtins.object),
        TypeData::Array { component } => {
            let erased = erase_to_raw(env, component);
            if erased == component {
                ty
            } else {
                env.types.array_of(erased)
            }
        }
        _ => ty,
    }
}

/// Re-express `ty` as an instance of `target`, propagating generics
/// arguments along the inheritance chain. `None` when `ty` is not a
/// subtype of `target`.
pub fn as_declared_in(env: &TypeEnv<'_>, ty: TypeId, target: ClassId) -> Option<TypeId> {
    if env.types.lookup(ty).named_class() == Some(target) {
        return Some(ty);
    }
    let mut seen: FxHashSet<TypeId> = FxHashSet::default();
    let mut frontier = vec![ty];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for current in frontier {
            for sup in direct_supertypes(env, current) {
                if !seen.insert(sup) {
                    continue;
                }
                if env.types.lookup(sup).named_class() == Some(target) {
                    return Some(sup);
                }
                next.push(sup);
            }
        }
        frontier = next;
    }
    None
}

/// Whether `ty`'s nominal hierarchy reaches `target`.
pub fn reaches_class(env: &TypeEnv<'_>, ty: TypeId, target: ClassId) -> bool {
    as_declared_in(env, ty, target).is_some()
}

/// Shortest inheritance-chain step count from `ty` to `target`.
/// Reaching `Object` costs one extra step, and interface targets use
/// the *longest* interface path depth.
pub fn inheritance_distance(env: &TypeEnv<'_>, ty: TypeId, target: ClassId) -> Option<u32> {
    let from_class = env.types.lookup(ty).named_class();
    if from_class == Some(target) {
        return Some(0);
    }
    let target_is_object = target == env.store.builtins.object_class;
    let target_is_interface = env.store.class(target).is_interface();

    let base = if target_is_interface {
        longest_path(env, ty, target, 0)?
    } else {
        shortest_path(env, ty, target)?
    };
    Some(if target_is_object { base + 1 } else { base })
}

fn shortest_path(env: &TypeEnv<'_>, ty: TypeId, target: ClassId) -> Option<u32> {
    let mut seen: FxHashSet<TypeId> = FxHashSet::default();
    let mut frontier = vec![ty];
    let mut depth = 0u32;
    while !frontier.is_empty() {
        depth += 1;
        let mut next = Vec::new();
        for current in frontier {
            for sup in direct_supertypes(env, current) {
                if !seen.insert(sup) {
                    continue;
                }
                if env.types.lookup(sup).named_class() == Some(target) {
                    return Some(depth);
                }
                next.push(sup);
            }
        }
        frontier = next;
    }
    None
}

fn longest_path(env: &TypeEnv<'_>, ty: TypeId, target: ClassId, depth: u32) -> Option<u32> {
    // The hierarchy is acyclic by construction; depth-cap as a guard
    // against a malformed store.
    if depth > 64 {
        return None;
    }
    let mut best: Option<u32> = None;
    for sup in direct_supertypes(env, ty) {
        let found = if env.types.lookup(sup).named_class() == Some(target) {
            Some(depth + 1)
        } else {
            longest_path(env, sup, target, depth + 1)
        };
        if let Some(d) = found {
            best = Some(best.map_or(d, |b: u32| b.max(d)));
        }
    }
    best
}
