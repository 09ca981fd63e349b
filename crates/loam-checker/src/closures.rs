//! Closure parameter inference.
//!
//! A closure literal's parameter types come from three places, in
//! priority order: explicit declarations on the closure itself, a
//! signature hint supplied for the target method parameter, and the
//! single abstract method of a SAM-shaped target type. A closure that
//! declares no parameters has the implicit single parameter `it`.

use crate::context::ClosureSignature;
use loam_solver::unify::{apply_bindings, class_arg_bindings, GenericsBindings};
use loam_solver::{is_assignable_to, TypeData, TypeEnv, TypeId, TypeInterner};

/// Effective arity of a closure literal; zero declared parameters means
/// the implicit `it`.
pub fn effective_arity(declared: usize) -> usize {
    if declared == 0 { 1 } else { declared }
}

/// The signature a SAM-shaped target imposes on a closure flowing into
/// it: the single abstract method's parameter and return types, with the
/// target's generics arguments substituted.
pub fn sam_signature(env: &TypeEnv<'_>, target: TypeId) -> Option<ClosureSignature> {
    sam_signature_with(env, target, None)
}

/// Like `sam_signature`, with extra bindings (typically the receiver's
/// class arguments) merged in for placeholders the target itself leaves
/// open.
pub fn sam_signature_with(
    env: &TypeEnv<'_>,
    target: TypeId,
    extra: Option<&GenericsBindings>,
) -> Option<ClosureSignature> {
    let TypeData::Named { class, .. } = env.types.lookup(target) else {
        return None;
    };
    if class == env.store.builtins.closure_class {
        return None;
    }
    let sam = env.store.sam_method(class)?.clone();
    let mut bindings = class_arg_bindings(env, target);
    if let Some(extra) = extra {
        // Receiver bindings fill gaps; they never override the target's
        // own arguments, which were inserted as fixed.
        let _ = bindings.merge(env, extra);
    }
    let params = sam
        .params
        .iter()
        .map(|p| apply_bindings(env, &bindings, p.ty))
        .collect();
    let ret = apply_bindings(env, &bindings, sam.ret);
    Some(ClosureSignature { params, ret })
}

/// Pick the hint signature for a closure. Candidates are filtered by the
/// closure's effective arity, then parameter-by-parameter against its
/// declared parameter types; a signature is attached only when exactly
/// one candidate survives.
pub fn pick_hint(
    env: &TypeEnv<'_>,
    hints: &[Vec<TypeId>],
    declared: &[Option<TypeId>],
) -> Option<Vec<TypeId>> {
    let arity = effective_arity(declared.len());
    let mut by_arity: Vec<&Vec<TypeId>> =
        hints.iter().filter(|sig| sig.len() == arity).collect();
    if by_arity.is_empty() {
        by_arity = hints
            .iter()
            .filter(|sig| sig.len() == declared.len())
            .collect();
    }
    let mut survivors = by_arity.into_iter().filter(|sig| {
        declared.iter().zip(sig.iter()).all(|(decl, &hint)| match decl {
            Some(decl) => is_assignable_to(env, hint, *decl),
            None => true,
        })
    });
    let picked = survivors.next()?;
    if survivors.next().is_some() {
        return None;
    }
    Some(picked.clone())
}

/// Final parameter types for a closure: an explicit declaration wins,
/// then the inferred signature, then the unknown type. A parameterless
/// closure gets its implicit `it` from the inference (or stays unknown).
pub fn merge_params(declared: &[Option<TypeId>], inferred: Option<&[TypeId]>) -> Vec<TypeId> {
    if declared.is_empty() {
        let it = inferred
            .and_then(|sig| sig.first().copied())
            .unwrap_or(TypeInterner::UNKNOWN);
        return vec![it];
    }
    declared
        .iter()
        .enumerate()
        .map(|(i, decl)| {
            decl.or_else(|| inferred.and_then(|sig| sig.get(i).copied()))
                .unwrap_or(TypeInterner::UNKNOWN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_common::Interner;
    use loam_hir::Visibility;
    use loam_solver::{
        ClassInfo, ClassKind, ClassStore, MemberFlags, MethodInfo, ParamInfo, PrimitiveKind,
        TypeParamInfo,
    };
    use smallvec::SmallVec;
    use std::sync::Arc;

    fn sam_store() -> (Arc<Interner>, TypeInterner, ClassStore, loam_solver::ClassId) {
        let interner = Arc::new(Interner::new());
        let types = TypeInterner::new();
        let mut store = ClassStore::new(&interner, &types);
        // interface Transformer<T> { R call... } modeled as
        // interface Mapper<T> { Object apply(T value) }
        let t = interner.intern("T");
        let t_ph = types.placeholder(t, []);
        let name = interner.intern("Mapper");
        let id = store.reserve(name);
        let apply = MethodInfo {
            name: interner.intern("apply"),
            declaring: id,
            type_params: Vec::new(),
            params: vec![ParamInfo {
                name: interner.intern("value"),
                ty: t_ph,
                has_default: false,
            }],
            ret: store.builtins.object,
            flags: MemberFlags::ABSTRACT,
            visibility: Visibility::Public,
        };
        store.replace(
            id,
            ClassInfo {
                name,
                package: None,
                kind: ClassKind::Interface,
                is_abstract: true,
                type_params: vec![TypeParamInfo {
                    name: t,
                    upper: SmallVec::new(),
                }],
                superclass: None,
                interfaces: Vec::new(),
                self_types: Vec::new(),
                fields: Vec::new(),
                properties: Vec::new(),
                methods: vec![apply],
                ctors: Vec::new(),
            },
        );
        (interner, types, store, id)
    }

    #[test]
    fn sam_target_supplies_parameter_types() {
        let (interner, types, store, mapper) = sam_store();
        let env = TypeEnv::new(&interner, &types, &store);
        let int_wrapper = store.builtins.wrapper(PrimitiveKind::Int);
        let target = types.named_with(mapper, [int_wrapper]);

        let sig = sam_signature(&env, target).expect("SAM signature");
        assert_eq!(sig.params, vec![int_wrapper]);
        assert_eq!(sig.ret, store.builtins.object);
    }

    #[test]
    fn closure_class_target_is_not_a_sam() {
        let (interner, types, store, _) = sam_store();
        let env = TypeEnv::new(&interner, &types, &store);
        let closure_ty = types.named(store.builtins.closure_class);
        assert!(sam_signature(&env, closure_ty).is_none());
    }

    #[test]
    fn parameterless_closure_gets_implicit_it() {
        let inferred = vec![TypeId(7)];
        let params = merge_params(&[], Some(&inferred));
        assert_eq!(params, vec![TypeId(7)]);
        assert_eq!(merge_params(&[], None), vec![TypeInterner::UNKNOWN]);
    }

    #[test]
    fn declared_parameter_type_wins_over_inference() {
        let inferred = vec![TypeId(7), TypeId(8)];
        let params = merge_params(&[Some(TypeId(3)), None], Some(&inferred));
        assert_eq!(params, vec![TypeId(3), TypeId(8)]);
    }

    #[test]
    fn hint_matching_uses_effective_arity() {
        let (interner, types, store, _) = sam_store();
        let env = TypeEnv::new(&interner, &types, &store);
        let string = store.builtins.string;
        let object = store.builtins.object;
        let hints = vec![vec![string, object], vec![string]];
        assert_eq!(pick_hint(&env, &hints, &[]), Some(vec![string]));
        assert_eq!(
            pick_hint(&env, &hints, &[None, None]),
            Some(vec![string, object])
        );
        assert_eq!(pick_hint(&env, &hints, &[None, None, None]), None);
    }

    #[test]
    fn declared_types_disambiguate_same_arity_hints() {
        let (interner, types, store, _) = sam_store();
        let env = TypeEnv::new(&interner, &types, &store);
        let string = store.builtins.string;
        let int = types.primitive(PrimitiveKind::Int);
        let hints = vec![vec![string], vec![int]];
        assert_eq!(pick_hint(&env, &hints, &[Some(int)]), Some(vec![int]));
        assert_eq!(pick_hint(&env, &hints, &[Some(string)]), Some(vec![string]));
        // No declared type to filter on: both candidates survive, so
        // nothing is attached.
        assert_eq!(pick_hint(&env, &hints, &[None]), None);
    }
}
