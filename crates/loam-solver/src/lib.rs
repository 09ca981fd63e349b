//! Type model, assignability and generics unification for the Loam
//! static type-checking engine.
//!
//! The solver owns the immutable type representation (`TypeData` interned
//! to `TypeId`), the class store (the symbol table the checker resolves
//! members against), and the pure type-level judgments: numeric
//! widening, assignability, least-upper-bound, and the generics
//! unifier's `extract_bindings`/`apply_bindings` pair. Everything that
//! needs driver context (candidate scoring, diagnostics, narrowing)
//! lives in the checker crate.

pub mod def;
pub mod display;
pub mod hierarchy;
pub mod intern;
pub mod lub;
pub mod relate;
pub mod types;
pub mod unify;
pub mod widening;

pub use def::{
    Builtins, ClassId, ClassInfo, ClassKind, ClassStore, FieldInfo, MemberFlags, MethodInfo,
    ParamInfo, PropertyInfo, TypeParamInfo,
};
pub use display::display_type;
pub use intern::TypeInterner;
pub use lub::{lowest_upper_bound, lub_all};
pub use relate::{is_assignable_to, is_raw_usage, primitive_kind_of};
pub use types::{Bounds, PrimitiveKind, TypeArgs, TypeData, TypeId};
pub use unify::{Binding, GenericsBindings, apply_bindings, class_arg_bindings, extract_bindings};

use loam_common::Interner;

/// Shared read-only view over the interners and the class store, passed
/// through the solver's judgment functions.
#[derive(Copy, Clone)]
pub struct TypeEnv<'a> {
    pub interner: &'a Interner,
    pub types: &'a TypeInterner,
    pub store: &'a ClassStore,
}

impl<'a> TypeEnv<'a> {
    pub fn new(interner: &'a Interner, types: &'a TypeInterner, store: &'a ClassStore) -> Self {
        Self {
            interner,
            types,
            store,
        }
    }

    pub fn builtins(&self) -> &Builtins {
        &self.store.builtins
    }

    pub fn display(&self, ty: TypeId) -> String {
        display_type(self, ty)
    }
}
