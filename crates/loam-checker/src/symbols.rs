//! Member resolution: receiver candidate lists and per-receiver member
//! collection.
//!
//! Candidate construction is deliberately generous; overload scoring in
//! `methods` does the narrowing. Collection order is significant: the
//! receiver's own class first, then supertypes in breadth order, then
//! trait-like self types, then extension methods. Within one class,
//! declaration order is preserved so later tie-breaks are deterministic.

use crate::context::CheckerContext;
use loam_common::Atom;
use loam_solver::hierarchy::{as_declared_in, erase_to_raw, reaches_class, supertypes_bfs};
use loam_solver::unify::{apply_bindings, class_arg_bindings};
use loam_solver::{
    ClassId, FieldInfo, MemberFlags, MethodInfo, ParamInfo, PrimitiveKind, PropertyInfo, TypeData,
    TypeEnv, TypeId,
};
use loam_hir::Visibility;
use smallvec::SmallVec;

/// One entry of a receiver candidate list, labeled with its provenance
/// for diagnostics.
#[derive(Copy, Clone, Debug)]
pub struct Receiver {
    pub ty: TypeId,
    pub label: &'static str,
}

impl Receiver {
    pub fn plain(ty: TypeId) -> Self {
        Self { ty, label: "" }
    }
}

/// Receivers for a call with an explicit receiver expression: the
/// receiver's type followed by the declared self types of its class.
pub fn explicit_receivers(env: &TypeEnv<'_>, ty: TypeId) -> SmallVec<[Receiver; 2]> {
    let mut receivers: SmallVec<[Receiver; 2]> = SmallVec::new();
    receivers.push(Receiver::plain(ty));
    if let Some(class) = env.types.lookup(ty).named_class() {
        for &self_ty in &env.store.class(class).self_types {
            receivers.push(Receiver {
                ty: self_ty,
                label: "self type",
            });
        }
    }
    receivers
}

/// Receivers for an implicit-this call: the closure delegation chain of
/// the innermost closure (in strategy order), then the enclosing class.
pub fn implicit_receivers(env: &TypeEnv<'_>, ctx: &CheckerContext) -> SmallVec<[Receiver; 2]> {
    let mut receivers: SmallVec<[Receiver; 2]> = SmallVec::new();
    if let Some(meta) = ctx.delegation.last() {
        for (ty, label) in meta.receivers() {
            receivers.push(Receiver { ty, label });
        }
    }
    if let Some(class) = ctx.current_class() {
        let this_ty = env.types.named(class);
        if !receivers.iter().any(|r| r.ty == this_ty) {
            receivers.extend(explicit_receivers(env, this_ty));
        }
    }
    receivers
}

/// Whether a member declared in `declaring` with `visibility` is visible
/// from code in `from` (None for script scope).
pub fn is_accessible(
    env: &TypeEnv<'_>,
    visibility: Visibility,
    declaring: ClassId,
    from: Option<ClassId>,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => from == Some(declaring),
        Visibility::Protected => from.is_some_and(|f| {
            f == declaring || reaches_class(env, env.types.named(f), declaring)
        }),
        Visibility::Package => {
            let declaring_pkg = env.store.class(declaring).package;
            match from {
                Some(f) => env.store.class(f).package == declaring_pkg,
                None => declaring_pkg.is_none(),
            }
        }
    }
}

/// All method candidates named `name` on `receiver`, in collection
/// order, with inherited members, property accessor stubs, trailing
/// default-parameter variants, and extension methods included.
/// Overridden superclass variants are pruned in favor of the most
/// derived declaration.
pub fn find_methods(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    name: Atom,
    from: Option<ClassId>,
    static_only: bool,
) -> Vec<MethodInfo> {
    let mut out: Vec<MethodInfo> = Vec::new();
    let mut chain: Vec<TypeId> = vec![receiver];
    chain.extend(supertypes_bfs(env, receiver));

    for &ty in &chain {
        let Some(class) = env.types.lookup(ty).named_class() else {
            continue;
        };
        let info = env.store.class(class);
        for method in &info.methods {
            if method.name == name && is_accessible(env, method.visibility, class, from) {
                push_with_default_variants(&mut out, method.clone());
            }
        }
        for stub in accessor_stubs(env, class, name) {
            push_candidate(&mut out, stub);
        }
        for &self_ty in &info.self_types {
            for method in find_methods(env, self_ty, name, from, static_only) {
                push_candidate(&mut out, method);
            }
        }
    }

    for &ty in &chain {
        if let Some(class) = env.types.lookup(ty).named_class() {
            for method in env.store.extension_methods(class) {
                if method.name == name {
                    push_with_default_variants(&mut out, method.clone());
                }
            }
        }
    }
    // Arrays have no class of their own; extensions on Object apply.
    if matches!(env.types.lookup(receiver), TypeData::Array { .. }) {
        for method in env.store.extension_methods(env.store.builtins.object_class) {
            if method.name == name {
                push_with_default_variants(&mut out, method.clone());
            }
        }
    }

    if static_only {
        out.retain(|m| m.is_static());
    }
    out
}

/// Constructor candidates for `class`: the declared constructors (with
/// default-parameter variants) or an implicit zero-argument one.
pub fn find_constructors(env: &TypeEnv<'_>, class: ClassId, from: Option<ClassId>) -> Vec<MethodInfo> {
    let info = env.store.class(class);
    let mut out = Vec::new();
    for ctor in &info.ctors {
        if is_accessible(env, ctor.visibility, class, from) {
            push_with_default_variants(&mut out, ctor.clone());
        }
    }
    if info.ctors.is_empty() {
        out.push(MethodInfo {
            name: info.name,
            declaring: class,
            type_params: Vec::new(),
            params: Vec::new(),
            ret: env.types.named(class),
            flags: MemberFlags::SYNTHETIC,
            visibility: Visibility::Public,
        });
    }
    out
}

/// Resolved outcome of a property-style access.
#[derive(Clone, Debug)]
pub enum PropertyLookup {
    Field(FieldInfo),
    Property(PropertyInfo),
    /// Resolved through a declared zero-argument getter.
    Getter(MethodInfo),
}

impl PropertyLookup {
    pub fn ty(&self) -> TypeId {
        match self {
            PropertyLookup::Field(f) => f.ty,
            PropertyLookup::Property(p) => p.ty,
            PropertyLookup::Getter(m) => m.ret,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            PropertyLookup::Field(f) => f.flags.contains(MemberFlags::STATIC),
            PropertyLookup::Property(p) => p.flags.contains(MemberFlags::STATIC),
            PropertyLookup::Getter(m) => m.is_static(),
        }
    }

    pub fn declaring(&self) -> ClassId {
        match self {
            PropertyLookup::Field(f) => f.declaring,
            PropertyLookup::Property(p) => p.declaring,
            PropertyLookup::Getter(m) => m.declaring,
        }
    }
}

/// Resolve `receiver.name` as a readable property: fields first, then
/// declared properties, then zero-argument getters, walking the
/// hierarchy outward. The resolved type is instantiated with the
/// receiver's generics arguments.
pub fn find_property(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    name: Atom,
    from: Option<ClassId>,
) -> Option<PropertyLookup> {
    let mut chain: Vec<TypeId> = vec![receiver];
    chain.extend(supertypes_bfs(env, receiver));
    let getter_names = getter_atoms(env, name);

    for &ty in &chain {
        let Some(class) = env.types.lookup(ty).named_class() else {
            continue;
        };
        let info = env.store.class(class);
        if let Some(field) = info
            .fields
            .iter()
            .find(|f| f.name == name && is_accessible(env, f.visibility, class, from))
        {
            let mut field = field.clone();
            field.ty = instantiate_for_receiver(env, receiver, class, field.ty);
            return Some(PropertyLookup::Field(field));
        }
        if let Some(prop) = info.properties.iter().find(|p| p.name == name) {
            let mut prop = prop.clone();
            prop.ty = instantiate_for_receiver(env, receiver, class, prop.ty);
            return Some(PropertyLookup::Property(prop));
        }
        if let Some(getter) = info.methods.iter().find(|m| {
            getter_names.contains(&m.name)
                && m.params.is_empty()
                && is_accessible(env, m.visibility, class, from)
        }) {
            let mut getter = getter.clone();
            getter.ret = instantiate_for_receiver(env, receiver, class, getter.ret);
            return Some(PropertyLookup::Getter(getter));
        }
    }
    None
}

/// Resolve `receiver.@name`: declared fields only, accessors bypassed.
pub fn find_attribute(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    name: Atom,
    from: Option<ClassId>,
) -> Option<FieldInfo> {
    let mut chain: Vec<TypeId> = vec![receiver];
    chain.extend(supertypes_bfs(env, receiver));
    for &ty in &chain {
        let Some(class) = env.types.lookup(ty).named_class() else {
            continue;
        };
        let info = env.store.class(class);
        if let Some(field) = info
            .fields
            .iter()
            .find(|f| f.name == name && is_accessible(env, f.visibility, class, from))
        {
            let mut field = field.clone();
            field.ty = instantiate_for_receiver(env, receiver, class, field.ty);
            return Some(field);
        }
    }
    None
}

/// A settable slot for `receiver.name = value`: a field, a declared
/// property, or a single-argument setter. Returns the slot's type.
pub fn find_settable(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    name: Atom,
    from: Option<ClassId>,
) -> Option<TypeId> {
    if let Some(lookup) = find_property(env, receiver, name, from) {
        if !matches!(lookup, PropertyLookup::Getter(_)) {
            return Some(lookup.ty());
        }
    }
    let setter = setter_atom(env, name);
    let mut chain: Vec<TypeId> = vec![receiver];
    chain.extend(supertypes_bfs(env, receiver));
    for &ty in &chain {
        let Some(class) = env.types.lookup(ty).named_class() else {
            continue;
        };
        if let Some(method) = env.store.class(class).methods.iter().find(|m| {
            m.name == setter && m.params.len() == 1 && is_accessible(env, m.visibility, class, from)
        }) {
            return Some(instantiate_for_receiver(
                env,
                receiver,
                class,
                method.params[0].ty,
            ));
        }
    }
    None
}

/// Substitute the receiver's generics arguments into a member type
/// declared in `declaring`.
pub fn instantiate_for_receiver(
    env: &TypeEnv<'_>,
    receiver: TypeId,
    declaring: ClassId,
    member_ty: TypeId,
) -> TypeId {
    let Some(reexpressed) = as_declared_in(env, receiver, declaring) else {
        return member_ty;
    };
    let bindings = class_arg_bindings(env, reexpressed);
    if bindings.is_empty() {
        return member_ty;
    }
    apply_bindings(env, &bindings, member_ty)
}

/// Synthesized accessor methods for a declared property matching an
/// accessor-shaped call name.
fn accessor_stubs(env: &TypeEnv<'_>, class: ClassId, name: Atom) -> Vec<MethodInfo> {
    let text = env.interner.resolve(name);
    let Some((kind, prop_name)) = accessor_target(&text) else {
        return Vec::new();
    };
    let prop_atom = env.interner.intern(&prop_name);
    let info = env.store.class(class);
    let Some(prop) = info.properties.iter().find(|p| p.name == prop_atom) else {
        return Vec::new();
    };
    let mut flags = MemberFlags::SYNTHETIC;
    if prop.flags.contains(MemberFlags::STATIC) {
        flags |= MemberFlags::STATIC;
    }
    let stub = |params: Vec<ParamInfo>, ret: TypeId| MethodInfo {
        name,
        declaring: class,
        type_params: Vec::new(),
        params,
        ret,
        flags,
        visibility: Visibility::Public,
    };
    match kind {
        AccessorKind::Get => vec![stub(Vec::new(), prop.ty)],
        AccessorKind::Is => {
            let boolean = env.types.primitive(PrimitiveKind::Boolean);
            if prop.ty == boolean || prop.ty == env.store.builtins.wrapper(PrimitiveKind::Boolean) {
                vec![stub(Vec::new(), boolean)]
            } else {
                Vec::new()
            }
        }
        AccessorKind::Set => vec![stub(
            vec![ParamInfo {
                name: prop_atom,
                ty: prop.ty,
                has_default: false,
            }],
            env.types.primitive(PrimitiveKind::Void),
        )],
    }
}

enum AccessorKind {
    Get,
    Is,
    Set,
}

fn accessor_target(name: &str) -> Option<(AccessorKind, String)> {
    let (kind, rest) = if let Some(rest) = name.strip_prefix("get") {
        (AccessorKind::Get, rest)
    } else if let Some(rest) = name.strip_prefix("is") {
        (AccessorKind::Is, rest)
    } else if let Some(rest) = name.strip_prefix("set") {
        (AccessorKind::Set, rest)
    } else {
        return None;
    };
    let mut chars = rest.chars();
    let first = chars.next().filter(|c| c.is_uppercase())?;
    let mut prop = String::with_capacity(rest.len());
    prop.extend(first.to_lowercase());
    prop.push_str(chars.as_str());
    Some((kind, prop))
}

fn getter_atoms(env: &TypeEnv<'_>, prop: Atom) -> SmallVec<[Atom; 2]> {
    let text = env.interner.resolve(prop);
    let cap = capitalize(&text);
    let mut atoms: SmallVec<[Atom; 2]> = SmallVec::new();
    atoms.push(env.interner.intern(&format!("get{cap}")));
    atoms.push(env.interner.intern(&format!("is{cap}")));
    atoms
}

fn setter_atom(env: &TypeEnv<'_>, prop: Atom) -> Atom {
    let text = env.interner.resolve(prop);
    env.interner.intern(&format!("set{}", capitalize(&text)))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Append a method plus reduced-arity variants for trailing defaulted
/// parameters.
fn push_with_default_variants(out: &mut Vec<MethodInfo>, method: MethodInfo) {
    let trailing_defaults = method
        .params
        .iter()
        .rev()
        .take_while(|p| p.has_default)
        .count();
    for drop in 1..=trailing_defaults {
        let mut variant = method.clone();
        variant.params.truncate(method.params.len() - drop);
        variant.flags |= MemberFlags::SYNTHETIC;
        push_candidate(out, variant);
    }
    push_candidate(out, method);
}

/// Append unless an equivalent signature (same name, same erased
/// parameter list) is already present; the earlier, more derived
/// declaration wins.
fn push_candidate(out: &mut Vec<MethodInfo>, method: MethodInfo) {
    let duplicate = out.iter().any(|existing| {
        existing.name == method.name
            && existing.params.len() == method.params.len()
            && existing
                .params
                .iter()
                .zip(method.params.iter())
                .all(|(a, b)| a.ty == b.ty)
    });
    if !duplicate {
        out.push(method);
    }
}

/// Erased signature key used by callers that need set semantics over
/// candidates collected from several receivers.
pub fn erased_signature(env: &TypeEnv<'_>, method: &MethodInfo) -> (Atom, Vec<TypeId>) {
    (
        method.name,
        method
            .params
            .iter()
            .map(|p| erase_to_raw(env, p.ty))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_common::Interner;
    use loam_solver::{ClassInfo, ClassKind, ClassStore, TypeInterner};
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

        fn class_with(&mut self, name: &str, f: impl FnOnce(&mut ClassInfo)) -> ClassId {
            let atom = self.interner.intern(name);
            let mut info = ClassInfo {
                name: atom,
                package: None,
                kind: ClassKind::Class,
                is_abstract: false,
                type_params: Vec::new(),
                superclass: Some(self.store.builtins.object),
                interfaces: Vec::new(),
                self_types: Vec::new(),
                fields: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                ctors: Vec::new(),
            };
            f(&mut info);
            self.store.register(info)
        }
    }

    fn method(fx: &Fixture, declaring: ClassId, name: &str, params: Vec<TypeId>, ret: TypeId) -> MethodInfo {
        MethodInfo {
            name: fx.interner.intern(name),
            declaring,
            type_params: Vec::new(),
            params: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| ParamInfo {
                    name: fx.interner.intern(&format!("p{i}")),
                    ty,
                    has_default: false,
                })
                .collect(),
            ret,
            flags: MemberFlags::empty(),
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn inherited_methods_are_collected_after_own() {
        let mut fx = Fixture::new();
        let base = fx.class_with("Base", |_| {});
        let base_ty = fx.types.named(base);
        let base_m = method(&fx, base, "run", vec![], fx.store.builtins.object);
        let sub = fx.class_with("Sub", |info| {
            info.superclass = Some(base_ty);
        });
        let sub_m = method(&fx, sub, "run", vec![fx.store.builtins.string], fx.store.builtins.object);
        // register methods after ids exist
        let mut base_info = fx.store.class(base).clone();
        base_info.methods.push(base_m);
        fx.store.replace(base, base_info);
        let mut sub_info = fx.store.class(sub).clone();
        sub_info.methods.push(sub_m);
        fx.store.replace(sub, sub_info);

        let env = fx.env();
        let name = fx.interner.intern("run");
        let found = find_methods(&env, fx.types.named(sub), name, None, false);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].declaring, sub);
        assert_eq!(found[1].declaring, base);
    }

    #[test]
    fn override_shadows_superclass_variant() {
        let mut fx = Fixture::new();
        let base = fx.class_with("Base", |_| {});
        let base_ty = fx.types.named(base);
        let sub = fx.class_with("Sub", |info| {
            info.superclass = Some(base_ty);
        });
        let sig = vec![fx.store.builtins.string];
        let base_m = method(&fx, base, "run", sig.clone(), fx.store.builtins.object);
        let sub_m = method(&fx, sub, "run", sig, fx.store.builtins.string);
        let mut base_info = fx.store.class(base).clone();
        base_info.methods.push(base_m);
        fx.store.replace(base, base_info);
        let mut sub_info = fx.store.class(sub).clone();
        sub_info.methods.push(sub_m);
        fx.store.replace(sub, sub_info);

        let env = fx.env();
        let name = fx.interner.intern("run");
        let found = find_methods(&env, fx.types.named(sub), name, None, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].declaring, sub);
        assert_eq!(found[0].ret, fx.store.builtins.string);
    }

    #[test]
    fn property_synthesizes_getter_stub() {
        let mut fx = Fixture::new();
        let string = fx.store.builtins.string;
        let name_atom = fx.interner.intern("name");
        let c = fx.class_with("Person", |_| {});
        let mut info = fx.store.class(c).clone();
        info.properties.push(PropertyInfo {
            name: name_atom,
            declaring: c,
            ty: string,
            flags: MemberFlags::empty(),
        });
        fx.store.replace(c, info);

        let env = fx.env();
        let getter = fx.interner.intern("getName");
        let found = find_methods(&env, fx.types.named(c), getter, None, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ret, string);
        assert!(found[0].flags.contains(MemberFlags::SYNTHETIC));
    }

    #[test]
    fn default_parameters_produce_reduced_arity_variants() {
        let mut fx = Fixture::new();
        let string = fx.store.builtins.string;
        let int = fx.types.primitive(PrimitiveKind::Int);
        let c = fx.class_with("C", |_| {});
        let mut m = method(&fx, c, "greet", vec![string, int], fx.store.builtins.object);
        m.params[1].has_default = true;
        let mut info = fx.store.class(c).clone();
        info.methods.push(m);
        fx.store.replace(c, info);

        let env = fx.env();
        let name = fx.interner.intern("greet");
        let found = find_methods(&env, fx.types.named(c), name, None, false);
        assert_eq!(found.len(), 2);
        let arities: Vec<usize> = found.iter().map(|m| m.params.len()).collect();
        assert!(arities.contains(&1) && arities.contains(&2));
    }

    #[test]
    fn private_members_invisible_outside_declaring_class() {
        let mut fx = Fixture::new();
        let c = fx.class_with("C", |_| {});
        let mut m = method(&fx, c, "secret", vec![], fx.store.builtins.object);
        m.visibility = Visibility::Private;
        let mut info = fx.store.class(c).clone();
        info.methods.push(m);
        fx.store.replace(c, info);
        let other = fx.class_with("Other", |_| {});

        let env = fx.env();
        let name = fx.interner.intern("secret");
        assert!(find_methods(&env, fx.types.named(c), name, Some(other), false).is_empty());
        assert_eq!(
            find_methods(&env, fx.types.named(c), name, Some(c), false).len(),
            1
        );
    }

    #[test]
    fn generic_member_type_instantiated_from_receiver() {
        let fx = Fixture::new();
        let env = fx.env();
        // List<String> element type resolves through Collection<E>.
        let list = fx.store.builtins.list_class;
        let string = fx.store.builtins.string;
        let list_of_string = fx.types.named_with(list, [string]);
        let e = fx.interner.intern("E");
        let placeholder = fx.types.placeholder(e, []);
        let instantiated = instantiate_for_receiver(&env, list_of_string, list, placeholder);
        assert_eq!(instantiated, string);
    }
}
