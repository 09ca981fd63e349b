//! Least-upper-bound computation.
//!
//! Merge rule for branch-dependent types and conflicting generics
//! bindings. Primitives are boxed before the walk; the result is the
//! nearest common supertype in breadth order (classes before
//! interfaces), falling back to Object.

use crate::hierarchy::supertypes_bfs;
use crate::relate::is_assignable_to;
use crate::types::{TypeData, TypeId};
use crate::TypeEnv;

pub fn lowest_upper_bound(env: &TypeEnv<'_>, a: TypeId, b: TypeId) -> TypeId {
    if a == b {
        return a;
    }
    let da = env.types.lookup(a);
    let db = env.types.lookup(b);

    // Unknown absorbs into the determined side.
    if matches!(da, TypeData::Unknown) {
        return b;
    }
    if matches!(db, TypeData::Unknown) {
        return a;
    }

    let a = boxed(env, a);
    let b = boxed(env, b);
    if a == b {
        return a;
    }

    if is_assignable_to(env, a, b) {
        return b;
    }
    if is_assignable_to(env, b, a) {
        return a;
    }

    if let (TypeData::Array { component: ca }, TypeData::Array { component: cb }) =
        (env.types.lookup(a), env.types.lookup(b))
    {
        let merged = lowest_upper_bound(env, ca, cb);
        return env.types.array_of(merged);
    }

    for sup in supertypes_bfs(env, a) {
        if is_assignable_to(env, b, sup) {
            return sup;
        }
    }
    env.store.builtins.object
}

pub fn lub_all(env: &TypeEnv<'_>, types: impl IntoIterator<Item = TypeId>) -> TypeId {
    let mut iter = types.into_iter();
    let Some(first) = iter.next() else {
        return env.store.builtins.object;
    };
    iter.fold(first, |acc, ty| lowest_upper_bound(env, acc, ty))
}

/// Box a primitive to its wrapper; reference types pass through.
pub fn boxed(env: &TypeEnv<'_>, ty: TypeId) -> TypeId {
    match env.types.lookup(ty) {
        TypeData::Primitive(kind) => env.store.builtins.wrapper(kind),
        _ => ty,
    }
}
