//! The class store: the solver-owned symbol table.
//!
//! `ClassId` identifies a class, interface, or enum definition. The store
//! is built once per compilation scope (builtin prelude plus the classes
//! the front-end registers) and is read-only during checking. Extension
//! methods — methods attached to a type from outside its declaration —
//! live in a side registry keyed by the target class.

use crate::intern::TypeInterner;
use crate::types::{Bounds, PrimitiveKind, TypeData, TypeId};
use bitflags::bitflags;
use loam_common::Atom;
use loam_hir::Visibility;
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct MemberFlags: u16 {
        const STATIC = 1 << 0;
        const ABSTRACT = 1 << 1;
        const VARARGS = 1 << 2;
        /// Attached from outside the declaring type; implicit
        /// receiver-as-first-argument already stripped.
        const EXTENSION = 1 << 3;
        /// Synthesized by the resolver (accessor stubs, default-argument
        /// constructor variants).
        const SYNTHETIC = 1 << 4;
        const FINAL = 1 << 5;
    }
}

/// A generics parameter of a class or method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParamInfo {
    pub name: Atom,
    pub upper: Bounds,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: Atom,
    pub ty: TypeId,
    pub has_default: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: Atom,
    pub declaring: ClassId,
    /// Placeholders scoped to the method, distinct from the declaring
    /// class's placeholders.
    pub type_params: Vec<TypeParamInfo>,
    pub params: Vec<ParamInfo>,
    pub ret: TypeId,
    pub flags: MemberFlags,
    pub visibility: Visibility,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MemberFlags::ABSTRACT)
    }

    pub fn is_varargs(&self) -> bool {
        self.flags.contains(MemberFlags::VARARGS)
    }

    pub fn is_extension(&self) -> bool {
        self.flags.contains(MemberFlags::EXTENSION)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: Atom,
    pub declaring: ClassId,
    pub ty: TypeId,
    pub flags: MemberFlags,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: Atom,
    pub declaring: ClassId,
    pub ty: TypeId,
    pub flags: MemberFlags,
}

#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: Atom,
    pub package: Option<Atom>,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub type_params: Vec<TypeParamInfo>,
    /// Superclass as a (possibly generic) type; may reference this
    /// class's own placeholders.
    pub superclass: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// Types the receiver must also satisfy structurally (trait-like
    /// mixins); their members join the candidate set.
    pub self_types: Vec<TypeId>,
    pub fields: Vec<FieldInfo>,
    pub properties: Vec<PropertyInfo>,
    pub methods: Vec<MethodInfo>,
    pub ctors: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }
}

/// Well-known classes and types registered by the bootstrap.
#[derive(Clone, Debug)]
pub struct Builtins {
    pub object_class: ClassId,
    pub object: TypeId,
    pub string_class: ClassId,
    pub string: TypeId,
    pub gstring_class: ClassId,
    pub gstring: TypeId,
    pub char_sequence_class: ClassId,
    pub char_sequence: TypeId,
    pub number_class: ClassId,
    pub number: TypeId,
    pub big_decimal_class: ClassId,
    pub big_decimal: TypeId,
    pub big_integer_class: ClassId,
    pub big_integer: TypeId,
    pub comparable_class: ClassId,
    pub iterable_class: ClassId,
    pub collection_class: ClassId,
    pub list_class: ClassId,
    pub map_class: ClassId,
    pub closure_class: ClassId,
    pub enum_class: ClassId,
    /// Wrapper class per primitive kind, in `PrimitiveKind` order
    /// (`Void` maps to `java.lang.Void`-like `Void`).
    wrappers: [(ClassId, TypeId); 9],
}

impl Builtins {
    pub fn wrapper(&self, kind: PrimitiveKind) -> TypeId {
        self.wrappers[kind as usize].1
    }

    pub fn wrapper_class(&self, kind: PrimitiveKind) -> ClassId {
        self.wrappers[kind as usize].0
    }

    /// Reverse lookup: the primitive a wrapper class boxes, if any.
    pub fn unboxed(&self, class: ClassId) -> Option<PrimitiveKind> {
        const KINDS: [PrimitiveKind; 9] = [
            PrimitiveKind::Boolean,
            PrimitiveKind::Char,
            PrimitiveKind::Byte,
            PrimitiveKind::Short,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
            PrimitiveKind::Void,
        ];
        self.wrappers
            .iter()
            .position(|(c, _)| *c == class)
            .map(|i| KINDS[i])
    }
}

pub struct ClassStore {
    classes: Vec<ClassInfo>,
    by_name: FxHashMap<Atom, ClassId>,
    extensions: FxHashMap<ClassId, Vec<MethodInfo>>,
    pub builtins: Builtins,
}

impl ClassStore {
    /// Create a store with the builtin prelude registered.
    pub fn new(interner: &loam_common::Interner, types: &TypeInterner) -> Self {
        bootstrap(interner, types)
    }

    pub fn register(&mut self, info: ClassInfo) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.by_name.insert(info.name, id);
        self.classes.push(info);
        id
    }

    /// Reserve a name before its members are filled in; mutually
    /// referencing classes register in two phases.
    pub fn reserve(&mut self, name: Atom) -> ClassId {
        let id = self.register(ClassInfo {
            name,
            package: None,
            kind: ClassKind::Class,
            is_abstract: false,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            self_types: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
        });
        id
    }

    pub fn replace(&mut self, id: ClassId, info: ClassInfo) {
        self.by_name.insert(info.name, id);
        self.classes[id.0 as usize] = info;
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    pub fn lookup(&self, name: Atom) -> Option<ClassId> {
        self.by_name.get(&name).copied()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn register_extension_method(&mut self, target: ClassId, mut method: MethodInfo) {
        method.flags |= MemberFlags::EXTENSION;
        self.extensions.entry(target).or_default().push(method);
    }

    pub fn extension_methods(&self, target: ClassId) -> &[MethodInfo] {
        self.extensions.get(&target).map_or(&[], |v| v.as_slice())
    }

    /// The single abstract method of a SAM type, if the class qualifies.
    /// Searches the class's own methods and, for interfaces, treats
    /// body-less methods as abstract.
    pub fn sam_method(&self, id: ClassId) -> Option<&MethodInfo> {
        let info = self.class(id);
        let mut found = None;
        for method in &info.methods {
            if method.is_abstract() {
                if found.is_some() {
                    return None;
                }
                found = Some(method);
            }
        }
        found
    }
}

fn intern_class_type(types: &TypeInterner, class: ClassId) -> TypeId {
    types.named(class)
}

/// Register the builtin prelude and produce the store.
fn bootstrap(interner: &loam_common::Interner, types: &TypeInterner) -> ClassStore {
    let mut classes: Vec<ClassInfo> = Vec::new();
    let mut by_name: FxHashMap<Atom, ClassId> = FxHashMap::default();

    let mut add = |classes: &mut Vec<ClassInfo>,
                   by_name: &mut FxHashMap<Atom, ClassId>,
                   info: ClassInfo|
     -> ClassId {
        let id = ClassId(classes.len() as u32);
        by_name.insert(info.name, id);
        classes.push(info);
        id
    };

    let plain = |name: Atom,
                 kind: ClassKind,
                 superclass: Option<TypeId>,
                 interfaces: Vec<TypeId>| ClassInfo {
        name,
        package: None,
        kind,
        is_abstract: false,
        type_params: Vec::new(),
        superclass,
        interfaces,
        self_types: Vec::new(),
        fields: Vec::new(),
        properties: Vec::new(),
        methods: Vec::new(),
        ctors: Vec::new(),
    };

    // Object first; everything else chains to it.
    let object_class = add(
        &mut classes,
        &mut by_name,
        plain(interner.intern("Object"), ClassKind::Class, None, vec![]),
    );
    let object = intern_class_type(types, object_class);

    let comparable_t = interner.intern("T");
    let comparable_class = add(&mut classes, &mut by_name, {
        let mut info = plain(
            interner.intern("Comparable"),
            ClassKind::Interface,
            None,
            vec![],
        );
        info.type_params = vec![TypeParamInfo {
            name: comparable_t,
            upper: Bounds::new(),
        }];
        info
    });

    let char_sequence_class = add(
        &mut classes,
        &mut by_name,
        plain(
            interner.intern("CharSequence"),
            ClassKind::Interface,
            None,
            vec![],
        ),
    );
    let char_sequence = intern_class_type(types, char_sequence_class);

    let string_class = add(
        &mut classes,
        &mut by_name,
        plain(
            interner.intern("String"),
            ClassKind::Class,
            Some(object),
            vec![char_sequence],
        ),
    );
    let string = intern_class_type(types, string_class);

    let gstring_class = add(
        &mut classes,
        &mut by_name,
        plain(
            interner.intern("GString"),
            ClassKind::Class,
            Some(object),
            vec![char_sequence],
        ),
    );
    let gstring = intern_class_type(types, gstring_class);

    let number_class = add(
        &mut classes,
        &mut by_name,
        plain(interner.intern("Number"), ClassKind::Class, Some(object), vec![]),
    );
    let number = intern_class_type(types, number_class);

    let big_decimal_class = add(
        &mut classes,
        &mut by_name,
        plain(
            interner.intern("BigDecimal"),
            ClassKind::Class,
            Some(number),
            vec![],
        ),
    );
    let big_integer_class = add(
        &mut classes,
        &mut by_name,
        plain(
            interner.intern("BigInteger"),
            ClassKind::Class,
            Some(number),
            vec![],
        ),
    );

    let wrapper_names = [
        ("Boolean", false),
        ("Character", false),
        ("Byte", true),
        ("Short", true),
        ("Integer", true),
        ("Long", true),
        ("Float", true),
        ("Double", true),
        ("Void", false),
    ];
    let mut wrappers = [(ClassId(0), TypeId(0)); 9];
    for (i, (name, numeric)) in wrapper_names.iter().enumerate() {
        let superclass = if *numeric { number } else { object };
        let id = add(
            &mut classes,
            &mut by_name,
            plain(interner.intern(name), ClassKind::Class, Some(superclass), vec![]),
        );
        wrappers[i] = (id, intern_class_type(types, id));
    }

    let elem = interner.intern("E");
    let generic_iface = |name: &str, supers: Vec<TypeId>| {
        let mut info = plain(interner.intern(name), ClassKind::Interface, None, supers);
        info.type_params = vec![TypeParamInfo {
            name: elem,
            upper: Bounds::new(),
        }];
        info
    };

    let iterable_class = add(&mut classes, &mut by_name, generic_iface("Iterable", vec![]));
    let elem_ph = types.placeholder(elem, []);
    let iterable_of_e = types.named_with(iterable_class, [elem_ph]);
    let collection_class = add(
        &mut classes,
        &mut by_name,
        generic_iface("Collection", vec![iterable_of_e]),
    );
    let collection_of_e = types.named_with(collection_class, [elem_ph]);
    let list_class = add(
        &mut classes,
        &mut by_name,
        generic_iface("List", vec![collection_of_e]),
    );

    let key = interner.intern("K");
    let value = interner.intern("V");
    let map_class = add(&mut classes, &mut by_name, {
        let mut info = plain(interner.intern("Map"), ClassKind::Interface, None, vec![]);
        info.type_params = vec![
            TypeParamInfo {
                name: key,
                upper: Bounds::new(),
            },
            TypeParamInfo {
                name: value,
                upper: Bounds::new(),
            },
        ];
        info
    });

    let closure_class = add(&mut classes, &mut by_name, {
        let mut info = plain(interner.intern("Closure"), ClassKind::Class, Some(object), vec![]);
        info.type_params = vec![TypeParamInfo {
            name: interner.intern("V"),
            upper: Bounds::new(),
        }];
        info
    });

    let enum_class = add(&mut classes, &mut by_name, {
        let mut info = plain(interner.intern("Enum"), ClassKind::Class, Some(object), vec![]);
        info.type_params = vec![TypeParamInfo {
            name: elem,
            upper: Bounds::new(),
        }];
        info
    });

    let builtins = Builtins {
        object_class,
        object,
        string_class,
        string,
        gstring_class,
        gstring,
        char_sequence_class,
        char_sequence,
        number_class,
        number,
        big_decimal_class,
        big_decimal: intern_class_type(types, big_decimal_class),
        big_integer_class,
        big_integer: intern_class_type(types, big_integer_class),
        comparable_class,
        iterable_class,
        collection_class,
        list_class,
        map_class,
        closure_class,
        enum_class,
        wrappers,
    };

    ClassStore {
        classes,
        by_name,
        extensions: FxHashMap::default(),
        builtins,
    }
}
