//! Structural type representation.
//!
//! Types are immutable value objects interned to `TypeId`s: two types are
//! structurally equal iff their ids are equal. New types are produced by
//! interning new `TypeData`, never by mutation.

use crate::def::ClassId;
use loam_common::Atom;
use smallvec::SmallVec;

/// Interned type identifier. O(1) equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// The nine Loam primitive kinds. The six numeric kinds form the
/// widening total order byte < short < int < long < float < double.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        }
    }
}

pub type TypeArgs = SmallVec<[TypeId; 2]>;
pub type Bounds = SmallVec<[TypeId; 1]>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Primitive(PrimitiveKind),
    /// Nominal class/interface/enum type, possibly parameterized. Empty
    /// `args` on a generic class means the raw (erased) type.
    Named { class: ClassId, args: TypeArgs },
    Array { component: TypeId },
    /// A generics type variable awaiting a concrete binding.
    Placeholder { name: Atom, upper: Bounds },
    /// `?`, `? extends T` (upper) or `? super T` (lower).
    Wildcard { upper: Bounds, lower: Option<TypeId> },
    /// A closure literal's type. `params` is `None` until parameter
    /// inference has run; `ret` starts at `Unknown`.
    Closure {
        params: Option<Vec<TypeId>>,
        ret: TypeId,
    },
    /// The distinguished "could not be determined" type (e.g. a `null`
    /// literal). Assignable to and from everything.
    Unknown,
}

impl TypeData {
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeData::Primitive(_))
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            TypeData::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn named_class(&self) -> Option<ClassId> {
        match self {
            TypeData::Named { class, .. } => Some(*class),
            _ => None,
        }
    }
}
