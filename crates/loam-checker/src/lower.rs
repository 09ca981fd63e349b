//! Declaration lowering: registering a module's classes in the class
//! store and resolving syntactic type references to interned types.
//!
//! Registration runs in two phases so mutually-referencing classes work:
//! every class first reserves its id, then members are lowered with the
//! full name set visible.

use crate::context::MethodKey;
use loam_common::{Atom, Diagnostic, DiagnosticKind, DiagnosticSink, Interner, SourcePos, Span};
use loam_hir::{self as hir, Module, TypeRef, TypeRefArg};
use loam_solver::{
    Bounds, ClassId, ClassInfo, ClassKind, ClassStore, FieldInfo, MemberFlags, MethodInfo,
    ParamInfo, PrimitiveKind, PropertyInfo, TypeData, TypeId, TypeInterner, TypeParamInfo,
};
use rustc_hash::FxHashMap;

/// Result of lowering one module: the class id assigned to each declared
/// class, in declaration order, plus a reverse map for body lookup.
pub struct DeclaredModule {
    pub class_ids: Vec<ClassId>,
    by_class: FxHashMap<ClassId, usize>,
}

impl DeclaredModule {
    /// The index of a class declaration within the lowered module.
    pub fn decl_index(&self, class: ClassId) -> Option<usize> {
        self.by_class.get(&class).copied()
    }

    /// The HIR declaration backing a resolved method, when the method
    /// was declared in this module.
    pub fn method_decl<'m>(&self, module: &'m Module, key: MethodKey) -> Option<&'m hir::MethodDecl> {
        let idx = self.decl_index(key.class)?;
        let class = module.classes.get(idx)?;
        if key.is_ctor {
            class.ctors.get(key.index as usize)
        } else {
            class.methods.get(key.index as usize)
        }
    }
}

/// Lexically nested generics scopes consulted while resolving type
/// references (class scope, then method scope).
#[derive(Default)]
pub struct TypeParamScope {
    frames: Vec<Vec<TypeParamInfo>>,
}

impl TypeParamScope {
    pub fn push(&mut self, params: Vec<TypeParamInfo>) {
        self.frames.push(params);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn lookup(&self, name: Atom) -> Option<&TypeParamInfo> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.iter().find(|p| p.name == name))
    }
}

pub struct Lowerer<'a> {
    pub interner: &'a Interner,
    pub types: &'a TypeInterner,
}

impl<'a> Lowerer<'a> {
    pub fn new(interner: &'a Interner, types: &'a TypeInterner) -> Self {
        Self { interner, types }
    }

    /// Register every class of `module` into `store`.
    pub fn declare_module(
        &self,
        store: &mut ClassStore,
        module: &Module,
        sink: &mut DiagnosticSink,
    ) -> DeclaredModule {
        let mut class_ids = Vec::with_capacity(module.classes.len());
        let mut by_class = FxHashMap::default();

        for (idx, decl) in module.classes.iter().enumerate() {
            let id = store.reserve(decl.name);
            class_ids.push(id);
            by_class.insert(id, idx);
        }

        for (decl, &id) in module.classes.iter().zip(&class_ids) {
            let info = self.lower_class(store, decl, sink);
            store.replace(id, info);
        }

        DeclaredModule { class_ids, by_class }
    }

    fn lower_class(
        &self,
        store: &ClassStore,
        decl: &hir::ClassDecl,
        sink: &mut DiagnosticSink,
    ) -> ClassInfo {
        let mut scope = TypeParamScope::default();
        let class_params = self.lower_type_params(store, &mut scope, &decl.type_params, sink);

        let superclass = decl
            .superclass
            .as_ref()
            .map(|tr| self.lower_type_ref(store, &scope, tr, decl.pos, sink))
            .or_else(|| {
                (decl.kind != hir::ClassKind::Interface).then(|| store.builtins.object)
            });
        let interfaces = decl
            .interfaces
            .iter()
            .map(|tr| self.lower_type_ref(store, &scope, tr, decl.pos, sink))
            .collect();

        let id = store
            .lookup(decl.name)
            .unwrap_or(store.builtins.object_class);

        let fields = decl
            .fields
            .iter()
            .map(|f| self.lower_field(store, &scope, id, f, decl.pos, sink))
            .collect();
        let properties = decl
            .properties
            .iter()
            .map(|p| PropertyInfo {
                name: p.name,
                declaring: id,
                ty: p
                    .ty
                    .as_ref()
                    .map(|tr| self.lower_type_ref(store, &scope, tr, decl.pos, sink))
                    .unwrap_or(store.builtins.object),
                flags: if p.is_static {
                    MemberFlags::STATIC
                } else {
                    MemberFlags::empty()
                },
            })
            .collect();
        let methods = decl
            .methods
            .iter()
            .map(|m| self.lower_method(store, &mut scope, id, m, sink))
            .collect();
        let ctors = decl
            .ctors
            .iter()
            .map(|m| self.lower_method(store, &mut scope, id, m, sink))
            .collect();

        ClassInfo {
            name: decl.name,
            package: decl.package,
            kind: match decl.kind {
                hir::ClassKind::Class => ClassKind::Class,
                hir::ClassKind::Interface => ClassKind::Interface,
                hir::ClassKind::Enum => ClassKind::Enum,
            },
            is_abstract: decl.is_abstract,
            type_params: class_params,
            superclass,
            interfaces,
            self_types: Vec::new(),
            fields,
            properties,
            methods,
            ctors,
        }
    }

    fn lower_field(
        &self,
        store: &ClassStore,
        scope: &TypeParamScope,
        declaring: ClassId,
        field: &hir::FieldDecl,
        pos: SourcePos,
        sink: &mut DiagnosticSink,
    ) -> FieldInfo {
        let ty = field
            .ty
            .as_ref()
            .map(|tr| self.lower_type_ref(store, scope, tr, pos, sink))
            .unwrap_or(TypeInterner::UNKNOWN);
        let mut flags = MemberFlags::empty();
        if field.is_static {
            flags |= MemberFlags::STATIC;
        }
        FieldInfo {
            name: field.name,
            declaring,
            ty,
            flags,
            visibility: field.visibility,
        }
    }

    fn lower_method(
        &self,
        store: &ClassStore,
        scope: &mut TypeParamScope,
        declaring: ClassId,
        decl: &hir::MethodDecl,
        sink: &mut DiagnosticSink,
    ) -> MethodInfo {
        let type_params = self.lower_type_params(store, scope, &decl.type_params, sink);
        scope.push(type_params.clone());

        let mut params: Vec<ParamInfo> = decl
            .params
            .iter()
            .map(|p| ParamInfo {
                name: p.name,
                ty: p
                    .ty
                    .as_ref()
                    .map(|tr| self.lower_type_ref(store, scope, tr, decl.pos, sink))
                    .unwrap_or(store.builtins.object),
                has_default: p.default.is_some(),
            })
            .collect();

        // A varargs parameter is declared with its element type; the
        // resolver sees it as an array.
        if decl.is_varargs {
            if let Some(last) = params.last_mut() {
                if !matches!(self.types.lookup(last.ty), TypeData::Array { .. }) {
                    last.ty = self.types.array_of(last.ty);
                }
            }
        }

        // An undeclared return type stays Unknown and is inferred from
        // the body on demand.
        let ret = match &decl.ret {
            Some(tr) => self.lower_type_ref(store, scope, tr, decl.pos, sink),
            None => TypeInterner::UNKNOWN,
        };

        scope.pop();

        let mut flags = MemberFlags::empty();
        if decl.is_static {
            flags |= MemberFlags::STATIC;
        }
        if decl.is_abstract || decl.body.is_none() {
            flags |= MemberFlags::ABSTRACT;
        }
        if decl.is_varargs {
            flags |= MemberFlags::VARARGS;
        }

        MethodInfo {
            name: decl.name,
            declaring,
            type_params,
            params,
            ret,
            flags,
            visibility: decl.visibility,
        }
    }

    fn lower_type_params(
        &self,
        store: &ClassStore,
        scope: &mut TypeParamScope,
        params: &[hir::TypeParamRef],
        sink: &mut DiagnosticSink,
    ) -> Vec<TypeParamInfo> {
        // Bounds may reference sibling parameters, so the names enter
        // scope before the bounds are lowered.
        scope.push(
            params
                .iter()
                .map(|p| TypeParamInfo {
                    name: p.name,
                    upper: Bounds::new(),
                })
                .collect(),
        );
        let lowered: Vec<TypeParamInfo> = params
            .iter()
            .map(|p| TypeParamInfo {
                name: p.name,
                upper: p
                    .upper
                    .iter()
                    .map(|tr| self.lower_type_ref(store, scope, tr, SourcePos::DUMMY, sink))
                    .collect(),
            })
            .collect();
        scope.pop();
        lowered
    }

    /// Resolve a syntactic type reference. Unresolvable names produce an
    /// `UnresolvedSymbol` diagnostic and the unknown type.
    pub fn lower_type_ref(
        &self,
        store: &ClassStore,
        scope: &TypeParamScope,
        tr: &TypeRef,
        pos: SourcePos,
        sink: &mut DiagnosticSink,
    ) -> TypeId {
        let base = self.lower_base(store, scope, tr, pos, sink);
        let mut ty = base;
        for _ in 0..tr.dims {
            ty = self.types.array_of(ty);
        }
        ty
    }

    fn lower_base(
        &self,
        store: &ClassStore,
        scope: &TypeParamScope,
        tr: &TypeRef,
        pos: SourcePos,
        sink: &mut DiagnosticSink,
    ) -> TypeId {
        let name = self.interner.resolve(tr.name);
        if let Some(kind) = primitive_by_name(&name) {
            return self.types.primitive(kind);
        }
        if &*name == "def" {
            return TypeInterner::UNKNOWN;
        }
        if tr.args.is_empty() {
            if let Some(param) = scope.lookup(tr.name) {
                return self.types.placeholder(param.name, param.upper.iter().copied());
            }
        }
        let Some(class) = store.lookup(tr.name) else {
            sink.push(Diagnostic::new(
                DiagnosticKind::UnresolvedSymbol,
                Span::DUMMY,
                pos,
                format!("unable to resolve class {name}"),
            ));
            return TypeInterner::UNKNOWN;
        };
        if tr.args.is_empty() {
            return self.types.named(class);
        }
        let args: Vec<TypeId> = tr
            .args
            .iter()
            .map(|arg| match arg {
                TypeRefArg::Type(inner) => self.lower_type_ref(store, scope, inner, pos, sink),
                TypeRefArg::Wildcard { upper, lower } => {
                    let upper: Bounds = upper
                        .iter()
                        .map(|tr| self.lower_type_ref(store, scope, tr, pos, sink))
                        .collect();
                    let lower = lower
                        .as_ref()
                        .map(|tr| self.lower_type_ref(store, scope, tr, pos, sink));
                    self.types.intern(TypeData::Wildcard { upper, lower })
                }
            })
            .collect();
        self.types.named_with(class, args)
    }
}

fn primitive_by_name(name: &str) -> Option<PrimitiveKind> {
    Some(match name {
        "boolean" => PrimitiveKind::Boolean,
        "char" => PrimitiveKind::Char,
        "byte" => PrimitiveKind::Byte,
        "short" => PrimitiveKind::Short,
        "int" => PrimitiveKind::Int,
        "long" => PrimitiveKind::Long,
        "float" => PrimitiveKind::Float,
        "double" => PrimitiveKind::Double,
        "void" => PrimitiveKind::Void,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_common::Interner;
    use loam_hir::HirBuilder;
    use std::sync::Arc;

    fn setup() -> (Arc<Interner>, TypeInterner) {
        (Arc::new(Interner::new()), TypeInterner::new())
    }

    #[test]
    fn primitive_and_array_refs_resolve() {
        let (interner, types) = setup();
        let store = ClassStore::new(&interner, &types);
        let lowerer = Lowerer::new(&interner, &types);
        let mut sink = DiagnosticSink::default();
        let scope = TypeParamScope::default();

        let int_ref = TypeRef::plain(interner.intern("int"));
        let ty = lowerer.lower_type_ref(&store, &scope, &int_ref, SourcePos::DUMMY, &mut sink);
        assert_eq!(ty, types.primitive(PrimitiveKind::Int));

        let arr_ref = TypeRef::plain(interner.intern("String")).array(2);
        let ty = lowerer.lower_type_ref(&store, &scope, &arr_ref, SourcePos::DUMMY, &mut sink);
        assert_eq!(ty, types.array_of(types.array_of(store.builtins.string)));
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn unknown_name_reports_unresolved_symbol() {
        let (interner, types) = setup();
        let store = ClassStore::new(&interner, &types);
        let lowerer = Lowerer::new(&interner, &types);
        let mut sink = DiagnosticSink::default();
        let scope = TypeParamScope::default();

        let bad = TypeRef::plain(interner.intern("Nope"));
        let ty = lowerer.lower_type_ref(&store, &scope, &bad, SourcePos::DUMMY, &mut sink);
        assert_eq!(ty, TypeInterner::UNKNOWN);
        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(
            sink.diagnostics()[0].kind,
            DiagnosticKind::UnresolvedSymbol
        );
    }

    #[test]
    fn declared_classes_are_mutually_visible() {
        let (interner, types) = setup();
        let mut store = ClassStore::new(&interner, &types);
        let mut b = HirBuilder::new(interner.clone());

        let mut a = b.class("A");
        let to_b = b.tr("B");
        a.methods.push(b.method("other", vec![], Some(to_b), Some(vec![])));
        b.push_class(a);
        let mut c = b.class("B");
        let to_a = b.tr("A");
        c.methods.push(b.method("back", vec![], Some(to_a), Some(vec![])));
        b.push_class(c);
        let module = b.finish();

        let lowerer = Lowerer::new(&interner, &types);
        let mut sink = DiagnosticSink::default();
        let declared = lowerer.declare_module(&mut store, &module, &mut sink);

        assert!(sink.diagnostics().is_empty());
        let a_info = store.class(declared.class_ids[0]);
        assert_eq!(a_info.methods[0].ret, types.named(declared.class_ids[1]));
    }

    #[test]
    fn varargs_parameter_becomes_array() {
        let (interner, types) = setup();
        let mut store = ClassStore::new(&interner, &types);
        let mut b = HirBuilder::new(interner.clone());

        let mut c = b.class("C");
        let str_ref = b.tr("String");
        let mut m = b.method("join", vec![b.param("parts", Some(str_ref))], None, Some(vec![]));
        m.is_varargs = true;
        c.methods.push(m);
        b.push_class(c);
        let module = b.finish();

        let lowerer = Lowerer::new(&interner, &types);
        let mut sink = DiagnosticSink::default();
        let declared = lowerer.declare_module(&mut store, &module, &mut sink);

        let info = store.class(declared.class_ids[0]);
        let method = &info.methods[0];
        assert!(method.is_varargs());
        assert_eq!(method.params[0].ty, types.array_of(store.builtins.string));
    }
}
