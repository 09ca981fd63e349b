//! Overload resolution.
//!
//! Candidates that survive the applicability gate are ranked by an
//! additive distance: 0 for an exact parameter match, small penalties
//! for numeric widening and boxing, inheritance-chain steps for nominal
//! conversions, a large constant for matching through varargs
//! reshaping, and one extra step for extension methods. The lowest
//! total wins; an exact tie is ambiguous unless the final tie-break
//! resolves it: when extension and non-extension methods tie, the
//! extension subset is preferred.

use loam_solver::hierarchy::inheritance_distance;
use loam_solver::lub::boxed;
use loam_solver::unify::{apply_bindings, class_arg_bindings, extract_bindings, GenericsBindings};
use loam_solver::widening::numeric_rank;
use loam_solver::{
    is_assignable_to, primitive_kind_of, MethodInfo, TypeData, TypeEnv, TypeId,
};

const VARARGS_PENALTY_BASE: u32 = 256;
const EXTENSION_PENALTY: u32 = 1;

/// A resolved call: the chosen method, the generics bindings accumulated
/// from the receiver and the arguments, and the instantiated signature.
#[derive(Clone, Debug)]
pub struct ResolvedCall {
    pub method: MethodInfo,
    pub receiver: TypeId,
    pub bindings: GenericsBindings,
    /// Parameter types after substitution, expanded to the call's arity
    /// when the match went through varargs.
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

#[derive(Debug)]
pub enum Resolution {
    None,
    Unique(Box<ResolvedCall>),
    Ambiguous(Vec<MethodInfo>),
}

struct ScoredCandidate {
    method: MethodInfo,
    distance: u32,
    varargs_mode: bool,
    bindings: GenericsBindings,
}

/// Rank `candidates` against the argument types and pick the best match.
pub fn choose_method(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    candidates: &[MethodInfo],
    arg_types: &[TypeId],
) -> Resolution {
    let mut scored: Vec<ScoredCandidate> = Vec::new();
    for method in candidates {
        if let Some(candidate) = score_candidate(env, receiver, method, arg_types) {
            scored.push(candidate);
        }
    }
    if scored.is_empty() {
        return Resolution::None;
    }

    let best = scored.iter().map(|c| c.distance).min().unwrap_or(0);
    let mut tied: Vec<ScoredCandidate> = scored
        .into_iter()
        .filter(|c| c.distance == best)
        .collect();

    if tied.len() > 1 {
        // Final tie-break: extension methods tied with non-extensions
        // win over them; a tie among extensions alone stays ambiguous.
        let extensions = tied.iter().filter(|c| c.method.is_extension()).count();
        if extensions > 0 && extensions < tied.len() {
            tied.retain(|c| c.method.is_extension());
        }
    }

    if tied.len() > 1 {
        return Resolution::Ambiguous(tied.into_iter().map(|c| c.method).collect());
    }
    let chosen = tied.remove(0);
    Resolution::Unique(Box::new(instantiate(env, receiver, chosen, arg_types)))
}

fn instantiate(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    candidate: ScoredCandidate,
    arg_types: &[TypeId],
) -> ResolvedCall {
    let ScoredCandidate {
        method,
        bindings,
        varargs_mode,
        ..
    } = candidate;

    let mut params: Vec<TypeId> = method
        .params
        .iter()
        .map(|p| apply_bindings(env, &bindings, p.ty))
        .collect();
    if varargs_mode {
        let component = params
            .pop()
            .map(|last| match env.types.lookup(last) {
                TypeData::Array { component } => component,
                _ => last,
            })
            .unwrap_or(env.store.builtins.object);
        while params.len() < arg_types.len() {
            params.push(component);
        }
    }
    let ret = apply_bindings(env, &bindings, method.ret);
    ResolvedCall {
        method,
        receiver,
        bindings,
        params,
        ret,
    }
}

fn score_candidate(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    method: &MethodInfo,
    arg_types: &[TypeId],
) -> Option<ScoredCandidate> {
    let params = &method.params;
    let mut distance = 0u32;
    let mut varargs_mode = false;

    // Receiver generics arguments are fixed bindings; argument-derived
    // bindings must stay compatible with them.
    let mut bindings = receiver_bindings(env, receiver, method);

    if params.len() == arg_types.len() {
        let mut direct = Some(0u32);
        for (arg, param) in arg_types.iter().zip(params.iter()) {
            match arg_distance(env, *arg, param.ty) {
                Some(d) => {
                    if let Some(total) = &mut direct {
                        *total += d;
                    }
                }
                None => {
                    direct = None;
                    break;
                }
            }
        }
        match direct {
            Some(total) => distance = total,
            None => {
                if !method.is_varargs() {
                    return None;
                }
                let (d, ok) = varargs_distance(env, params, arg_types)?;
                distance = d;
                varargs_mode = ok;
            }
        }
    } else if method.is_varargs() && arg_types.len() + 1 >= params.len() {
        let (d, ok) = varargs_distance(env, params, arg_types)?;
        distance = d;
        varargs_mode = ok;
    } else {
        return None;
    }

    if varargs_mode {
        distance += VARARGS_PENALTY_BASE.saturating_sub(params.len() as u32);
    }
    if method.is_extension() {
        distance += EXTENSION_PENALTY;
    }

    // Unify arguments against declared parameters; a conflict with a
    // fixed binding rejects the candidate.
    for (arg, param) in arg_types.iter().zip(params.iter()) {
        if !extract_bindings(env, *arg, param.ty, &mut bindings, false) {
            return None;
        }
    }

    Some(ScoredCandidate {
        method: method.clone(),
        distance,
        varargs_mode,
        bindings,
    })
}

fn receiver_bindings(env: &TypeEnv<'_>, receiver: TypeId, method: &MethodInfo) -> GenericsBindings {
    use loam_solver::hierarchy::as_declared_in;
    let reexpressed = as_declared_in(env, receiver, method.declaring).unwrap_or(receiver);
    class_arg_bindings(env, reexpressed)
}

/// Distance through varargs reshaping: fixed parameters first, then the
/// remaining arguments against the varargs component type.
fn varargs_distance(
    env: &TypeEnv<'_>,
    params: &[loam_solver::ParamInfo],
    arg_types: &[TypeId],
) -> Option<(u32, bool)> {
    let (last, fixed) = params.split_last()?;
    if arg_types.len() < fixed.len() {
        return None;
    }
    let component = match env.types.lookup(last.ty) {
        TypeData::Array { component } => component,
        _ => last.ty,
    };
    let mut total = 0u32;
    for (arg, param) in arg_types.iter().zip(fixed.iter()) {
        total += arg_distance(env, *arg, param.ty)?;
    }
    for &arg in &arg_types[fixed.len()..] {
        total += arg_distance(env, arg, component)?;
    }
    Some((total, true))
}

/// Conversion distance from one argument to one parameter. `None` when
/// the argument is not applicable at all.
fn arg_distance(env: &TypeEnv<'_>, arg: TypeId, param: TypeId) -> Option<u32> {
    if arg == param {
        return Some(0);
    }
    let arg_data = env.types.lookup(arg);
    let param_data = env.types.lookup(param);
    if matches!(arg_data, TypeData::Unknown) || matches!(param_data, TypeData::Unknown) {
        return Some(0);
    }

    // Numeric conversions: two per widening step, plus one for crossing
    // the primitive/wrapper boundary.
    let arg_kind = primitive_kind_of(env, arg);
    let param_kind = primitive_kind_of(env, param);
    if let (Some(ak), Some(pk)) = (arg_kind, param_kind) {
        if let (Some(ra), Some(rp)) = (numeric_rank(ak), numeric_rank(pk)) {
            if ra > rp {
                return None;
            }
            let arg_boxed = !matches!(arg_data, TypeData::Primitive(_));
            let param_boxed = !matches!(param_data, TypeData::Primitive(_));
            let crossing = u32::from(arg_boxed != param_boxed);
            return Some(2 * u32::from(rp - ra) + crossing);
        }
        if ak == pk {
            // Same kind, one side boxed.
            return Some(1);
        }
    }

    if !is_assignable_to(env, arg, param) {
        return None;
    }

    // Arrays score by component.
    if let (TypeData::Array { component: ac }, TypeData::Array { component: pc }) =
        (&arg_data, &param_data)
    {
        return arg_distance(env, *ac, *pc);
    }

    // Placeholder parameters measure against their erased bound.
    if let TypeData::Placeholder { upper, .. } = &param_data {
        let bound = upper.first().copied().unwrap_or(env.store.builtins.object);
        return arg_distance(env, arg, bound).or(Some(1));
    }

    // Nominal conversion: inheritance-chain steps from the (boxed)
    // argument to the parameter's class.
    if let Some(param_class) = param_data.named_class() {
        let source = boxed(env, arg);
        if let Some(steps) = inheritance_distance(env, source, param_class) {
            return Some(steps);
        }
    }

    // Assignable through a special-case rule (string/gstring, enum
    // coercion, closure-to-SAM): one step.
    Some(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_common::Interner;
    use loam_hir::Visibility;
    use loam_solver::{
        ClassId, ClassStore, MemberFlags, ParamInfo, PrimitiveKind, TypeInterner,
    };
    use std::sync::Arc;

    struct Fixture {
        interner: Arc<Interner>,
        types: TypeInterner,
        store: ClassStore,
    }

    impl Fixture {
        fn new() -> Self {
            let interner = Arc::new(Interner::new());
            let types = TypeInterner::new();
            let store = ClassStore::new(&interner, &types);
            Self {
                interner,
                types,
                store,
            }
        }

        fn env(&self) -> TypeEnv<'_> {
            TypeEnv::new(&self.interner, &self.types, &self.store)
        }

        fn method(&self, name: &str, params: Vec<TypeId>, ret: TypeId) -> MethodInfo {
            MethodInfo {
                name: self.interner.intern(name),
                declaring: self.store.builtins.object_class,
                type_params: Vec::new(),
                params: params
                    .into_iter()
                    .enumerate()
                    .map(|(i, ty)| ParamInfo {
                        name: self.interner.intern(&format!("p{i}")),
                        ty,
                        has_default: false,
                    })
                    .collect(),
                ret,
                flags: MemberFlags::empty(),
                visibility: Visibility::Public,
            }
        }
    }

    fn unique(resolution: Resolution) -> ResolvedCall {
        match resolution {
            Resolution::Unique(call) => *call,
            other => panic!("expected a unique resolution, got {other:?}"),
        }
    }

    #[test]
    fn exact_match_beats_boxing() {
        let fx = Fixture::new();
        let env = fx.env();
        let int = fx.types.primitive(PrimitiveKind::Int);
        let integer = fx.store.builtins.wrapper(PrimitiveKind::Int);
        let object = fx.store.builtins.object;
        let candidates = vec![
            fx.method("f", vec![integer], object),
            fx.method("f", vec![int], object),
        ];
        let call = unique(choose_method(&env, object, &candidates, &[int]));
        assert_eq!(call.method.params[0].ty, int);
    }

    #[test]
    fn boxing_beats_varargs() {
        let fx = Fixture::new();
        let env = fx.env();
        let int = fx.types.primitive(PrimitiveKind::Int);
        let integer = fx.store.builtins.wrapper(PrimitiveKind::Int);
        let object = fx.store.builtins.object;
        let mut varargs = fx.method("f", vec![fx.types.array_of(int)], object);
        varargs.flags |= MemberFlags::VARARGS;
        let candidates = vec![varargs, fx.method("f", vec![integer], object)];
        let call = unique(choose_method(&env, object, &candidates, &[int]));
        assert_eq!(call.method.params[0].ty, integer);
    }

    #[test]
    fn string_argument_selects_string_overload_over_object() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let string = fx.store.builtins.string;
        let candidates = vec![
            fx.method("f", vec![object], object),
            fx.method("f", vec![string], object),
        ];
        let call = unique(choose_method(&env, object, &candidates, &[string]));
        assert_eq!(call.method.params[0].ty, string);
    }

    #[test]
    fn widening_distance_orders_numeric_overloads() {
        let fx = Fixture::new();
        let env = fx.env();
        let int = fx.types.primitive(PrimitiveKind::Int);
        let long = fx.types.primitive(PrimitiveKind::Long);
        let double = fx.types.primitive(PrimitiveKind::Double);
        let object = fx.store.builtins.object;
        let candidates = vec![
            fx.method("f", vec![double], object),
            fx.method("f", vec![long], object),
        ];
        let call = unique(choose_method(&env, object, &candidates, &[int]));
        assert_eq!(call.method.params[0].ty, long);
    }

    #[test]
    fn identical_distances_are_ambiguous() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let string = fx.store.builtins.string;
        let gstring = fx.store.builtins.gstring;
        // Unknown argument matches both at distance zero.
        let candidates = vec![
            fx.method("f", vec![string], object),
            fx.method("f", vec![gstring], object),
        ];
        match choose_method(&env, object, &candidates, &[TypeInterner::UNKNOWN]) {
            Resolution::Ambiguous(tied) => assert_eq!(tied.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn lone_extension_wins_ties() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let string = fx.store.builtins.string;
        let plain = fx.method("f", vec![string], object);
        let mut ext = fx.method("f", vec![string], string);
        ext.flags |= MemberFlags::EXTENSION;
        // The extension's +1 keeps the plain method ahead normally.
        let call = unique(choose_method(
            &env,
            object,
            &[plain, ext.clone()],
            &[string],
        ));
        assert!(!call.method.is_extension());
        // Alone among equally-distant candidates it is preferred.
        let mut ext2 = ext.clone();
        ext2.flags |= MemberFlags::EXTENSION;
        let mut other = fx.method("f", vec![string], object);
        other.flags |= MemberFlags::EXTENSION;
        let resolution = choose_method(&env, object, &[ext2, other], &[string]);
        assert!(matches!(resolution, Resolution::Ambiguous(_)));
    }

    #[test]
    fn extension_tied_with_plain_method_wins() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let int = fx.types.primitive(PrimitiveKind::Int);
        let integer = fx.store.builtins.wrapper(PrimitiveKind::Int);
        // Boxing costs 1; the extension's exact match plus its penalty
        // also costs 1, so the two tie.
        let plain = fx.method("f", vec![integer], object);
        let mut ext = fx.method("f", vec![int], object);
        ext.flags |= MemberFlags::EXTENSION;
        let call = unique(choose_method(&env, object, &[plain, ext], &[int]));
        assert!(call.method.is_extension());
    }

    #[test]
    fn no_applicable_candidate_is_none() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let int = fx.types.primitive(PrimitiveKind::Int);
        let string = fx.store.builtins.string;
        let candidates = vec![fx.method("f", vec![int], object)];
        assert!(matches!(
            choose_method(&env, object, &candidates, &[string]),
            Resolution::None
        ));
    }

    #[test]
    fn generic_return_instantiated_from_receiver() {
        let fx = Fixture::new();
        let env = fx.env();
        let list = fx.store.builtins.list_class;
        let string = fx.store.builtins.string;
        let list_of_string = fx.types.named_with(list, [string]);
        let e = fx.interner.intern("E");
        let placeholder = fx.types.placeholder(e, []);
        let mut getter = fx.method("head", vec![], placeholder);
        getter.declaring = list;
        let call = unique(choose_method(&env, list_of_string, &[getter], &[]));
        assert_eq!(call.ret, string);
    }

    #[test]
    fn varargs_accepts_spread_arguments() {
        let fx = Fixture::new();
        let env = fx.env();
        let object = fx.store.builtins.object;
        let string = fx.store.builtins.string;
        let mut m = fx.method("join", vec![fx.types.array_of(string)], string);
        m.flags |= MemberFlags::VARARGS;
        let call = unique(choose_method(&env, object, &[m], &[string, string, string]));
        assert_eq!(call.params.len(), 3);
        assert!(call.params.iter().all(|&p| p == string));
    }
}
