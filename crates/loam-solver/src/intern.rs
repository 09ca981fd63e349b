//! Type interning.
//!
//! `TypeInterner` deduplicates `TypeData` so structural equality is a
//! `TypeId` comparison. A reverse map (`DashMap`) serves lookups without
//! holding the arena lock.

use crate::def::ClassId;
use crate::types::{PrimitiveKind, TypeArgs, TypeData, TypeId};
use dashmap::DashMap;
use std::sync::RwLock;

pub struct TypeInterner {
    types: RwLock<Vec<TypeData>>,
    map: DashMap<TypeData, TypeId, rustc_hash::FxBuildHasher>,
}

impl TypeInterner {
    /// The distinguished unknown type is always id 0.
    pub const UNKNOWN: TypeId = TypeId(0);

    pub fn new() -> Self {
        let interner = Self {
            types: RwLock::new(Vec::new()),
            map: DashMap::default(),
        };
        let unknown = interner.intern(TypeData::Unknown);
        debug_assert_eq!(unknown, Self::UNKNOWN);
        interner
    }

    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(existing) = self.map.get(&data) {
            return *existing;
        }
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.map.get(&data) {
            return *existing;
        }
        let id = TypeId(types.len() as u32);
        types.push(data.clone());
        self.map.insert(data, id);
        id
    }

    pub fn lookup(&self, id: TypeId) -> TypeData {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types[id.0 as usize].clone()
    }

    // Convenience constructors

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.intern(TypeData::Primitive(kind))
    }

    pub fn named(&self, class: ClassId) -> TypeId {
        self.intern(TypeData::Named {
            class,
            args: TypeArgs::new(),
        })
    }

    pub fn named_with(&self, class: ClassId, args: impl IntoIterator<Item = TypeId>) -> TypeId {
        self.intern(TypeData::Named {
            class,
            args: args.into_iter().collect(),
        })
    }

    pub fn array_of(&self, component: TypeId) -> TypeId {
        self.intern(TypeData::Array { component })
    }

    pub fn placeholder(&self, name: loam_common::Atom, upper: impl IntoIterator<Item = TypeId>) -> TypeId {
        self.intern(TypeData::Placeholder {
            name,
            upper: upper.into_iter().collect(),
        })
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_structural() {
        let interner = TypeInterner::new();
        let a = interner.primitive(PrimitiveKind::Int);
        let b = interner.primitive(PrimitiveKind::Int);
        assert_eq!(a, b);
        let c = interner.array_of(a);
        let d = interner.array_of(b);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn unknown_is_preinterned() {
        let interner = TypeInterner::new();
        assert_eq!(interner.intern(TypeData::Unknown), TypeInterner::UNKNOWN);
    }
}
