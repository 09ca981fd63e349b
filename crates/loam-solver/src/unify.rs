//! Generics unification: placeholder-binding extraction and
//! back-substitution.
//!
//! `extract_bindings` walks a (usage, declaration) pair in lock-step and
//! records placeholder bindings; `apply_bindings` substitutes them back
//! onto a type expression. Conflicting bindings for the same placeholder
//! merge via least-upper-bound unless one side is *fixed* (came from an
//! explicit declaration), in which case the fixed binding wins and an
//! incompatible inferred one rejects the candidate.
//!
//! Binding maps are cycle-free by construction: a binding that would
//! reference its own placeholder is erased to the placeholder's upper
//! bound instead. Substitution carries a visited set so resolution
//! always terminates.

use crate::hierarchy::{as_declared_in, erase_to_raw};
use crate::lub::lowest_upper_bound;
use crate::relate::is_assignable_to;
use crate::types::{Bounds, TypeData, TypeId};
use crate::TypeEnv;
use indexmap::IndexMap;
use loam_common::Atom;
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::trace;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub ty: TypeId,
    /// Derived from an explicit, non-inferred declaration. Fixed
    /// bindings win conflicts instead of LUB-merging.
    pub fixed: bool,
}

/// Placeholder-name to bound-type map. Iteration order is insertion
/// order, which keeps merge results deterministic.
#[derive(Clone, Debug, Default)]
pub struct GenericsBindings {
    map: IndexMap<Atom, Binding, FxBuildHasher>,
}

impl GenericsBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: Atom) -> Option<Binding> {
        self.map.get(&name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Atom, Binding)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }

    /// Insert without conflict resolution. Used when the caller already
    /// knows the binding is authoritative (class-argument substitution).
    pub fn bind_unchecked(&mut self, name: Atom, ty: TypeId, fixed: bool) {
        self.map.insert(name, Binding { ty, fixed });
    }

    /// Insert with the merge rules. Returns `false` when the binding is
    /// incompatible with an existing fixed binding (the candidate using
    /// this map must be rejected).
    pub fn bind(
        &mut self,
        env: &TypeEnv<'_>,
        name: Atom,
        upper: &Bounds,
        ty: TypeId,
        fixed: bool,
    ) -> bool {
        // Nothing to learn from an undetermined argument.
        if matches!(env.types.lookup(ty), TypeData::Unknown) {
            return true;
        }
        // Self-reference erases to the upper bound instead of cycling.
        let ty = if contains_placeholder(env, ty, name, 0) {
            match upper.first() {
                Some(&u) if !contains_placeholder(env, u, name, 0) => u,
                _ => env.store.builtins.object,
            }
        } else {
            ty
        };

        match self.map.get(&name).copied() {
            None => {
                trace!(?name, ?ty, fixed, "bind placeholder");
                self.map.insert(name, Binding { ty, fixed });
                true
            }
            Some(existing) if existing.ty == ty => {
                if fixed && !existing.fixed {
                    self.map.insert(name, Binding { ty, fixed: true });
                }
                true
            }
            Some(existing) if existing.fixed => {
                // Fixed wins; the inferred side must be compatible.
                is_assignable_to(env, ty, existing.ty)
            }
            Some(existing) if fixed => {
                if !is_assignable_to(env, existing.ty, ty) {
                    return false;
                }
                self.map.insert(name, Binding { ty, fixed: true });
                true
            }
            Some(existing) => {
                let merged = lowest_upper_bound(env, existing.ty, ty);
                trace!(?name, ?merged, "merge conflicting bindings via LUB");
                self.map.insert(
                    name,
                    Binding {
                        ty: merged,
                        fixed: false,
                    },
                );
                true
            }
        }
    }

    /// Merge another binding map into this one with the same rules.
    pub fn merge(&mut self, env: &TypeEnv<'_>, other: &GenericsBindings) -> bool {
        for (name, binding) in other.iter() {
            if !self.bind(env, name, &Bounds::new(), binding.ty, binding.fixed) {
                return false;
            }
        }
        true
    }
}

/// Bindings for a parameterized class usage: the class's own placeholders
/// mapped to the usage's arguments (fixed). Raw usages produce an empty
/// map.
pub fn class_arg_bindings(env: &TypeEnv<'_>, ty: TypeId) -> GenericsBindings {
    let mut bindings = GenericsBindings::new();
    if let TypeData::Named { class, args } = env.types.lookup(ty) {
        let info = env.store.class(class);
        if args.len() == info.type_params.len() {
            for (param, arg) in info.type_params.iter().zip(args.iter()) {
                bindings.bind_unchecked(param.name, *arg, true);
            }
        }
    }
    bindings
}

fn contains_placeholder(env: &TypeEnv<'_>, ty: TypeId, name: Atom, depth: u32) -> bool {
    if depth > 64 {
        return false;
    }
    match env.types.lookup(ty) {
        TypeData::Placeholder { name: n, upper } => {
            n == name
                || upper
                    .iter()
                    .any(|&u| contains_placeholder(env, u, name, depth + 1))
        }
        TypeData::Named { args, .. } => args
            .iter()
            .any(|&a| contains_placeholder(env, a, name, depth + 1)),
        TypeData::Array { component } => contains_placeholder(env, component, name, depth + 1),
        TypeData::Wildcard { upper, lower } => {
            upper
                .iter()
                .any(|&u| contains_placeholder(env, u, name, depth + 1))
                || lower.is_some_and(|l| contains_placeholder(env, l, name, depth + 1))
        }
        TypeData::Closure { params, ret } => {
            contains_placeholder(env, ret, name, depth + 1)
                || params.iter().flatten().any(|&p| {
                    contains_placeholder(env, p, name, depth + 1)
                })
        }
        _ => false,
    }
}

/// Substitute every bound placeholder occurrence in `ty`. Unbound
/// placeholders with a non-trivial bound narrow to their upper bound;
/// wildcards recurse into their bounds.
pub fn apply_bindings(env: &TypeEnv<'_>, bindings: &GenericsBindings, ty: TypeId) -> TypeId {
    let mut visited = FxHashSet::default();
    apply_inner(env, bindings, ty, &mut visited)
}

fn apply_inner(
    env: &TypeEnv<'_>,
    bindings: &GenericsBindings,
    ty: TypeId,
    visited: &mut FxHashSet<Atom>,
) -> TypeId {
    match env.types.lookup(ty) {
        TypeData::Placeholder { name, upper } => {
            if let Some(binding) = bindings.get(name) {
                if visited.insert(name) {
                    let result = apply_inner(env, bindings, binding.ty, visited);
                    visited.remove(&name);
                    return result;
                }
                // Cycle through other placeholders: erase.
                return upper
                    .first()
                    .copied()
                    .unwrap_or(env.store.builtins.object);
            }
            if let Some(&bound) = upper.first() {
                return apply_inner(env, bindings, bound, visited);
            }
            ty
        }
        TypeData::Named { class, args } => {
            if args.is_empty() {
                return ty;
            }
            let new_args: Vec<TypeId> = args
                .iter()
                .map(|&a| apply_inner(env, bindings, a, visited))
                .collect();
            env.types.named_with(class, new_args)
        }
        TypeData::Array { component } => {
            let new_component = apply_inner(env, bindings, component, visited);
            if new_component == component {
                ty
            } else {
                env.types.array_of(new_component)
            }
        }
        TypeData::Wildcard { upper, lower } => {
            let new_upper: Bounds = upper
                .iter()
                .map(|&u| apply_inner(env, bindings, u, visited))
                .collect();
            let new_lower = lower.map(|l| apply_inner(env, bindings, l, visited));
            env.types.intern(TypeData::Wildcard {
                upper: new_upper,
                lower: new_lower,
            })
        }
        TypeData::Closure { params, ret } => {
            let new_params = params.map(|ps| {
                ps.iter()
                    .map(|&p| apply_inner(env, bindings, p, visited))
                    .collect()
            });
            let new_ret = apply_inner(env, bindings, ret, visited);
            env.types.intern(TypeData::Closure {
                params: new_params,
                ret: new_ret,
            })
        }
        _ => ty,
    }
}

/// Structurally walk a (usage, declaration) pair, recording placeholder
/// bindings. Returns `false` only when a binding conflicts with a fixed
/// one — a structural mismatch extracts nothing but does not fail.
pub fn extract_bindings(
    env: &TypeEnv<'_>,
    usage: TypeId,
    decl: TypeId,
    out: &mut GenericsBindings,
    fixed: bool,
) -> bool {
    extract_inner(env, usage, decl, out, fixed, 0)
}

fn extract_inner(
    env: &TypeEnv<'_>,
    usage: TypeId,
    decl: TypeId,
    out: &mut GenericsBindings,
    fixed: bool,
    depth: u32,
) -> bool {
    if depth > 64 {
        return true;
    }
    let decl_data = env.types.lookup(decl);
    let usage_data = env.types.lookup(usage);

    match decl_data {
        TypeData::Placeholder { name, upper } => out.bind(env, name, &upper, usage, fixed),
        TypeData::Wildcard { upper, lower } => {
            if let Some(l) = lower {
                // Lower-bounded wildcard: erase the usage to raw first.
                let erased = erase_to_raw(env, usage);
                if let TypeData::Placeholder { name, upper: ub } = env.types.lookup(l) {
                    out.bind(env, name, &ub, erased, fixed)
                } else {
                    true
                }
            } else if let Some(&u) = upper.first() {
                extract_inner(env, usage, u, out, fixed, depth + 1)
            } else {
                true
            }
        }
        TypeData::Array { component: dc } => match usage_data {
            TypeData::Array { component: uc } => {
                extract_inner(env, uc, dc, out, fixed, depth + 1)
            }
            _ => true,
        },
        TypeData::Named {
            class: decl_class,
            args: decl_args,
        } => {
            // A closure against a SAM declaration: substitute the
            // closure's inferred signature for the SAM method's before
            // unifying.
            if let TypeData::Closure { params, ret } = &usage_data {
                if let Some(sam) = env.store.sam_method(decl_class) {
                    let sam = sam.clone();
                    let mut ok = true;
                    if let Some(params) = params {
                        for (closure_param, sam_param) in params.iter().zip(sam.params.iter()) {
                            ok &= extract_inner(
                                env,
                                *closure_param,
                                sam_param.ty,
                                out,
                                fixed,
                                depth + 1,
                            );
                        }
                    }
                    if !matches!(env.types.lookup(*ret), TypeData::Unknown) {
                        ok &= extract_inner(env, *ret, sam.ret, out, fixed, depth + 1);
                    }
                    return ok;
                }
            }
            match usage_data {
                TypeData::Named {
                    class: usage_class,
                    args: usage_args,
                } => {
                    if usage_class == decl_class {
                        let mut ok = true;
                        for (u, d) in usage_args.iter().zip(decl_args.iter()) {
                            ok &= extract_inner(env, *u, *d, out, fixed, depth + 1);
                        }
                        ok
                    } else if let Some(reexpressed) = as_declared_in(env, usage, decl_class) {
                        // Subtype usage: re-express in the declaration's
                        // class first, propagating generics arguments.
                        if reexpressed == usage {
                            true
                        } else {
                            extract_inner(env, reexpressed, decl, out, fixed, depth + 1)
                        }
                    } else {
                        true
                    }
                }
                _ => true,
            }
        }
        TypeData::Closure {
            params: decl_params,
            ret: decl_ret,
        } => match usage_data {
            TypeData::Closure {
                params: usage_params,
                ret: usage_ret,
            } => {
                let mut ok = true;
                if let (Some(u), Some(d)) = (usage_params, decl_params) {
                    for (up, dp) in u.iter().zip(d.iter()) {
                        ok &= extract_inner(env, *up, *dp, out, fixed, depth + 1);
                    }
                }
                ok && extract_inner(env, usage_ret, decl_ret, out, fixed, depth + 1)
            }
            _ => true,
        },
        TypeData::Primitive(_) | TypeData::Unknown => true,
    }
}
