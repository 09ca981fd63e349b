//! Shared class-store fixture for the solver integration tests.

use loam_common::Interner;
use loam_hir::Visibility;
use loam_solver::{
    ClassId, ClassInfo, ClassKind, ClassStore, MemberFlags, MethodInfo, ParamInfo, PrimitiveKind,
    TypeEnv, TypeId, TypeInterner, TypeParamInfo,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// A small hierarchy: `Dog` and `Cat` extend `Animal`, `Dog` also
/// implements the `Pet` interface, and `Box<T>` is a one-parameter
/// generic container.
pub struct Fixture {
    pub interner: Arc<Interner>,
    pub types: TypeInterner,
    pub store: ClassStore,
    pub animal: ClassId,
    pub dog: ClassId,
    pub cat: ClassId,
    pub pet: ClassId,
    pub box_class: ClassId,
    pub t_placeholder: TypeId,
}

impl Fixture {
    pub fn new() -> Self {
        let interner = Arc::new(Interner::new());
        let types = TypeInterner::new();
        let mut store = ClassStore::new(&interner, &types);

        let object = store.builtins.object;
        let animal = store.register(plain_class(&interner, "Animal", Some(object)));
        let animal_ty = types.named(animal);

        let pet = store.register(ClassInfo {
            kind: ClassKind::Interface,
            is_abstract: true,
            ..plain_class(&interner, "Pet", None)
        });
        let pet_ty = types.named(pet);

        let mut dog_info = plain_class(&interner, "Dog", Some(animal_ty));
        dog_info.interfaces = vec![pet_ty];
        let dog = store.register(dog_info);
        let cat = store.register(plain_class(&interner, "Cat", Some(animal_ty)));

        let t = interner.intern("T");
        let t_placeholder = types.placeholder(t, []);
        let mut box_info = plain_class(&interner, "Box", Some(object));
        box_info.type_params = vec![TypeParamInfo {
            name: t,
            upper: SmallVec::new(),
        }];
        let box_id = store.reserve(interner.intern("Box"));
        box_info.methods = vec![
            MethodInfo {
                name: interner.intern("get"),
                declaring: box_id,
                type_params: Vec::new(),
                params: Vec::new(),
                ret: t_placeholder,
                flags: MemberFlags::empty(),
                visibility: Visibility::Public,
            },
            MethodInfo {
                name: interner.intern("put"),
                declaring: box_id,
                type_params: Vec::new(),
                params: vec![ParamInfo {
                    name: interner.intern("value"),
                    ty: t_placeholder,
                    has_default: false,
                }],
                ret: types.primitive(PrimitiveKind::Void),
                flags: MemberFlags::empty(),
                visibility: Visibility::Public,
            },
        ];
        store.replace(box_id, box_info);

        Self {
            interner,
            types,
            store,
            animal,
            dog,
            cat,
            pet,
            box_class: box_id,
            t_placeholder,
        }
    }

    pub fn env(&self) -> TypeEnv<'_> {
        TypeEnv::new(&self.interner, &self.types, &self.store)
    }

    pub fn ty(&self, class: ClassId) -> TypeId {
        self.types.named(class)
    }
}

fn plain_class(interner: &Interner, name: &str, superclass: Option<TypeId>) -> ClassInfo {
    ClassInfo {
        name: interner.intern(name),
        package: None,
        kind: ClassKind::Class,
        is_abstract: false,
        type_params: Vec::new(),
        superclass,
        interfaces: Vec::new(),
        self_types: Vec::new(),
        fields: Vec::new(),
        properties: Vec::new(),
        methods: Vec::new(),
        ctors: Vec::new(),
    }
}
