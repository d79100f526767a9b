//! The C type system: a tagged variant of every type kind the evaluator
//! needs to reason about, plus the qualifier set carried alongside them.
//!
//! Named types (struct/union/enum/typedef) are represented as a [`TypeId`]
//! into the owning [`catalogue::TypeCatalogue`] rather than embedded
//! inline - this is what lets two structs reference each other (a `struct
//! list_head` with a `next` member pointing back at `struct list_head`)
//! without an owning cycle: the catalogue owns the member list, a member
//! merely names the id.

pub mod array;
pub mod catalogue;
pub mod enum_ty;
pub mod json;
pub mod pointer;
pub mod rules;
pub mod struct_ty;
pub mod union_ty;

pub use array::ArrayType;
pub use catalogue::{TypeCatalogue, TypeId};
pub use enum_ty::EnumDef;
pub use pointer::PointerType;
pub use struct_ty::{StructDef, StructMember};
pub use union_ty::{UnionDef, UnionMember};

/// `const` / `volatile` / `restrict` / `_Atomic`, canonicalized as a small
/// bitset so that `const const int` and `const int` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Qualifiers(u8);

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers(0);
    pub const CONST: Qualifiers = Qualifiers(0b0001);
    pub const VOLATILE: Qualifiers = Qualifiers(0b0010);
    pub const RESTRICT: Qualifiers = Qualifiers(0b0100);
    pub const ATOMIC: Qualifiers = Qualifiers(0b1000);

    pub fn union(self, other: Qualifiers) -> Qualifiers {
        Qualifiers(self.0 | other.0)
    }

    pub fn contains(self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Qualifiers::CONST) {
            parts.push("const");
        }
        if self.contains(Qualifiers::VOLATILE) {
            parts.push("volatile");
        }
        if self.contains(Qualifiers::RESTRICT) {
            parts.push("restrict");
        }
        if self.contains(Qualifiers::ATOMIC) {
            parts.push("_Atomic");
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Relative C11 integer conversion rank. Distinct types may share a byte
/// size (e.g. `int` and `long` are both 4 bytes on some targets) but still
/// have a strict rank order for the usual arithmetic conversions.
pub type Rank = u8;

pub mod rank {
    use super::Rank;
    pub const BOOL: Rank = 0;
    pub const CHAR: Rank = 1;
    pub const SHORT: Rank = 2;
    pub const INT: Rank = 3;
    pub const LONG: Rank = 4;
    pub const LONG_LONG: Rank = 5;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerType {
    pub name: String,
    pub size: u8,
    pub signed: bool,
    pub rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingType {
    pub name: &'static str,
    pub size: u8,
}

/// One variant of the C type sum. Cheap to clone: derived and named
/// variants only carry a box/id, never a deep copy of member layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Integer(IntegerType),
    Floating(FloatingType),
    Boolean,
    Pointer(PointerType),
    Array(ArrayType),
    Struct(TypeId),
    Union(TypeId),
    Enum(TypeId),
    Typedef(TypeId),
    Qualified(Box<Type>, Qualifiers),
}

impl Type {
    /// Strips every [`Type::Qualified`] and [`Type::Typedef`] layer,
    /// returning the underlying type. `strip(strip(t)) == strip(t)`.
    pub fn strip(&self, catalogue: &TypeCatalogue) -> Type {
        match self {
            Type::Qualified(inner, _) => inner.strip(catalogue),
            Type::Typedef(id) => catalogue.typedef_target(*id).strip(catalogue),
            other => other.clone(),
        }
    }

    /// The qualifier set attached directly to this type (not recursing
    /// through typedefs - a `typedef const int cint` only exposes its
    /// qualifiers once stripped down to the `Qualified` layer).
    pub fn qualifiers(&self) -> Qualifiers {
        match self {
            Type::Qualified(_, q) => *q,
            _ => Qualifiers::NONE,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Qualified(inner, _) if inner.is_void())
            || matches!(self, Type::Integer(i) if i.name == "void")
    }

    pub fn is_integer(&self, catalogue: &TypeCatalogue) -> bool {
        matches!(
            self.strip(catalogue),
            Type::Integer(_) | Type::Boolean | Type::Enum(_)
        )
    }

    pub fn is_floating(&self, catalogue: &TypeCatalogue) -> bool {
        matches!(self.strip(catalogue), Type::Floating(_))
    }

    pub fn is_pointer(&self, catalogue: &TypeCatalogue) -> bool {
        matches!(self.strip(catalogue), Type::Pointer(_))
    }

    pub fn is_arithmetic(&self, catalogue: &TypeCatalogue) -> bool {
        self.is_integer(catalogue) || self.is_floating(catalogue)
    }

    /// A human-readable C spelling, used both for error messages and for
    /// the `(T)value` rendering prefix.
    pub fn spelling(&self, catalogue: &TypeCatalogue) -> String {
        match self {
            Type::Integer(i) => i.name.clone(),
            Type::Floating(f) => f.name.to_string(),
            Type::Boolean => "_Bool".to_string(),
            Type::Pointer(p) => format!("{} *", p.referent.spelling(catalogue)),
            Type::Array(a) => match a.length {
                Some(n) => format!("{} [{n}]", a.element.spelling(catalogue)),
                None => format!("{} []", a.element.spelling(catalogue)),
            },
            Type::Struct(id) => format!("struct {}", catalogue.name_of(*id)),
            Type::Union(id) => format!("union {}", catalogue.name_of(*id)),
            Type::Enum(id) => format!("enum {}", catalogue.name_of(*id)),
            Type::Typedef(id) => catalogue.name_of(*id).to_string(),
            Type::Qualified(inner, q) if q.is_empty() => inner.spelling(catalogue),
            Type::Qualified(inner, q) => format!("{q} {}", inner.spelling(catalogue)),
        }
    }
}
