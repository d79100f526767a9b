//! Named-type registry: lookup by C spelling, memoized construction of
//! pointer/array derived types, size/alignment queries, and storage for
//! struct/union/enum/typedef definitions.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{EvalError, Result};
use crate::types::enum_ty::EnumDef;
use crate::types::struct_ty::StructDef;
use crate::types::union_ty::UnionDef;
use crate::types::{rank, ArrayType, FloatingType, IntegerType, PointerType, Qualifiers, Type};

/// An index into the catalogue's named-type table. Cheap to copy; this is
/// what lets struct/union/enum/typedef types avoid an owning cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

enum NamedEntry {
    Struct(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
    Typedef { name: String, target: Type },
}

pub struct TypeCatalogue {
    entries: Vec<NamedEntry>,
    by_name: HashMap<String, TypeId>,
    pointer_width: u8,
    pointer_cache: RefCell<HashMap<(Type, u8), Type>>,
    array_cache: RefCell<HashMap<(Type, Option<u64>), Type>>,
}

impl TypeCatalogue {
    /// Builds a catalogue preloaded with the standard C integer and
    /// floating types, sized for a target with the given pointer width (4
    /// or 8 bytes).
    pub fn new(pointer_width: u8) -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            pointer_width,
            pointer_cache: RefCell::new(HashMap::new()),
            array_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    // -- named-type registration -------------------------------------

    /// Reserves a struct id before its member thunk is known, so the
    /// thunk itself can close over the id (see [`StructDef`]).
    pub fn reserve_struct(&mut self, name: impl Into<String>) -> TypeId {
        let name = name.into();
        let id = TypeId(self.entries.len());
        self.entries
            .push(NamedEntry::Struct(StructDef::incomplete(name.clone())));
        self.by_name.insert(format!("struct {name}"), id);
        id
    }

    pub fn define_struct(
        &mut self,
        id: TypeId,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<crate::types::StructMember> + 'static,
    ) {
        let name = self.struct_def(id).name.clone();
        self.entries[id.0] = NamedEntry::Struct(StructDef::new(name, size, members));
    }

    pub fn register_struct(
        &mut self,
        name: impl Into<String>,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<crate::types::StructMember> + 'static,
    ) -> TypeId {
        let id = self.reserve_struct(name);
        self.define_struct(id, size, members);
        id
    }

    pub fn register_union(
        &mut self,
        name: impl Into<String>,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<crate::types::UnionMember> + 'static,
    ) -> TypeId {
        let id = self.reserve_union(name);
        self.define_union(id, size, members);
        id
    }

    /// Reserves a union id before its member thunk is known, mirroring
    /// [`Self::reserve_struct`] for unions that reference themselves or a
    /// later-registered type.
    pub fn reserve_union(&mut self, name: impl Into<String>) -> TypeId {
        let name = name.into();
        let id = TypeId(self.entries.len());
        self.entries
            .push(NamedEntry::Union(UnionDef::new(Some(name.clone()), None, |_| Vec::new())));
        self.by_name.insert(format!("union {name}"), id);
        id
    }

    pub fn define_union(
        &mut self,
        id: TypeId,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<crate::types::UnionMember> + 'static,
    ) {
        let name = self.union_def(id).name.clone();
        self.entries[id.0] = NamedEntry::Union(UnionDef::new(name, size, members));
    }

    pub fn register_enum(
        &mut self,
        name: impl Into<String>,
        underlying: IntegerType,
        constants: Vec<(String, i128)>,
    ) -> TypeId {
        let name = name.into();
        let id = TypeId(self.entries.len());
        self.entries.push(NamedEntry::Enum(EnumDef::new(
            Some(name.clone()),
            underlying,
            constants,
        )));
        self.by_name.insert(format!("enum {name}"), id);
        id
    }

    pub fn register_typedef(&mut self, name: impl Into<String>, target: Type) -> TypeId {
        let name = name.into();
        let id = TypeId(self.entries.len());
        self.entries.push(NamedEntry::Typedef {
            name: name.clone(),
            target,
        });
        self.by_name.insert(name, id);
        id
    }

    pub fn struct_def(&self, id: TypeId) -> &StructDef {
        match &self.entries[id.0] {
            NamedEntry::Struct(s) => s,
            _ => panic!("TypeId {} is not a struct", id.0),
        }
    }

    pub fn union_def(&self, id: TypeId) -> &UnionDef {
        match &self.entries[id.0] {
            NamedEntry::Union(u) => u,
            _ => panic!("TypeId {} is not a union", id.0),
        }
    }

    pub fn enum_def(&self, id: TypeId) -> &EnumDef {
        match &self.entries[id.0] {
            NamedEntry::Enum(e) => e,
            _ => panic!("TypeId {} is not an enum", id.0),
        }
    }

    pub fn typedef_target(&self, id: TypeId) -> Type {
        match &self.entries[id.0] {
            NamedEntry::Typedef { target, .. } => target.clone(),
            _ => panic!("TypeId {} is not a typedef", id.0),
        }
    }

    pub fn name_of(&self, id: TypeId) -> &str {
        match &self.entries[id.0] {
            NamedEntry::Struct(s) => s.name.as_deref().unwrap_or("<anonymous>"),
            NamedEntry::Union(u) => u.name.as_deref().unwrap_or("<anonymous>"),
            NamedEntry::Enum(e) => e.name.as_deref().unwrap_or("<anonymous>"),
            NamedEntry::Typedef { name, .. } => name,
        }
    }

    // -- lookup by C spelling ------------------------------------------

    /// Looks up a named type by its C spelling: `"int"`, `"unsigned long"`,
    /// `"struct foo"`, `"union bar"`, `"enum baz"`, or a typedef name.
    pub fn find(&self, spelling: &str) -> Option<Type> {
        if let Some(builtin) = builtin_type(spelling) {
            return Some(builtin);
        }
        let found = self.by_name.get(spelling).map(|&id| match &self.entries[id.0] {
            NamedEntry::Struct(_) => Type::Struct(id),
            NamedEntry::Union(_) => Type::Union(id),
            NamedEntry::Enum(_) => Type::Enum(id),
            NamedEntry::Typedef { .. } => Type::Typedef(id),
        });
        if found.is_none() {
            log::trace!("type catalogue miss for '{spelling}'");
        }
        found
    }

    // -- derived-type constructors (memoized) ---------------------------

    pub fn pointer(&self, referent: Type) -> Type {
        let key = (referent.clone(), self.pointer_width);
        if let Some(cached) = self.pointer_cache.borrow().get(&key) {
            return cached.clone();
        }
        let ty = Type::Pointer(PointerType::new(referent, self.pointer_width));
        self.pointer_cache.borrow_mut().insert(key, ty.clone());
        ty
    }

    pub fn array(&self, element: Type, length: Option<u64>) -> Type {
        let key = (element.clone(), length);
        if let Some(cached) = self.array_cache.borrow().get(&key) {
            return cached.clone();
        }
        let ty = Type::Array(ArrayType::new(element, length));
        self.array_cache.borrow_mut().insert(key, ty.clone());
        ty
    }

    // -- size / alignment -------------------------------------------

    pub fn size_of(&self, ty: &Type) -> Result<u64> {
        match ty.strip(self) {
            Type::Integer(i) => Ok(i.size as u64),
            Type::Floating(f) => Ok(f.size as u64),
            Type::Boolean => Ok(1),
            Type::Pointer(p) => Ok(p.width as u64),
            Type::Array(a) => {
                let len = a.length.ok_or_else(|| EvalError::IncompleteType {
                    type_name: ty.spelling(self),
                })?;
                Ok(self.size_of(&a.element)? * len)
            }
            Type::Struct(id) => self.struct_def(id).size.ok_or_else(|| EvalError::IncompleteType {
                type_name: ty.spelling(self),
            }),
            Type::Union(id) => self.union_def(id).size.ok_or_else(|| EvalError::IncompleteType {
                type_name: ty.spelling(self),
            }),
            Type::Enum(id) => Ok(self.enum_def(id).underlying.size as u64),
            Type::Typedef(_) | Type::Qualified(..) => unreachable!("stripped"),
        }
    }

    pub fn align_of(&self, ty: &Type) -> Result<u64> {
        match ty.strip(self) {
            Type::Integer(i) => Ok(i.size as u64),
            Type::Floating(f) => Ok(f.size as u64),
            Type::Boolean => Ok(1),
            Type::Pointer(p) => Ok(p.width as u64),
            Type::Array(a) => self.align_of(&a.element),
            Type::Struct(id) => {
                let def = self.struct_def(id);
                def.size.ok_or_else(|| EvalError::IncompleteType {
                    type_name: ty.spelling(self),
                })?;
                def.members(self)
                    .iter()
                    .try_fold(1u64, |acc, m| Ok(acc.max(self.align_of(&m.ty)?)))
            }
            Type::Union(id) => {
                let def = self.union_def(id);
                def.size.ok_or_else(|| EvalError::IncompleteType {
                    type_name: ty.spelling(self),
                })?;
                def.members(self)
                    .iter()
                    .try_fold(1u64, |acc, m| Ok(acc.max(self.align_of(&m.ty)?)))
            }
            Type::Enum(id) => Ok(self.enum_def(id).underlying.size as u64),
            Type::Typedef(_) | Type::Qualified(..) => unreachable!("stripped"),
        }
    }
}

fn int_ty(name: &str, size: u8, signed: bool, rank: rank::Rank) -> Type {
    Type::Integer(IntegerType {
        name: name.to_string(),
        size,
        signed,
        rank,
    })
}

/// The standard C basic types, constructed on demand so the catalogue
/// doesn't need to special-case them in `by_name`.
fn builtin_type(spelling: &str) -> Option<Type> {
    Some(match spelling {
        "void" => int_ty("void", 0, false, rank::BOOL),
        "_Bool" | "bool" => Type::Boolean,
        "char" => int_ty("char", 1, true, rank::CHAR),
        "signed char" => int_ty("signed char", 1, true, rank::CHAR),
        "unsigned char" => int_ty("unsigned char", 1, false, rank::CHAR),
        "short" | "short int" | "signed short" => int_ty("short", 2, true, rank::SHORT),
        "unsigned short" | "unsigned short int" => int_ty("unsigned short", 2, false, rank::SHORT),
        "int" | "signed" | "signed int" => int_ty("int", 4, true, rank::INT),
        "unsigned" | "unsigned int" => int_ty("unsigned int", 4, false, rank::INT),
        "long" | "long int" | "signed long" => int_ty("long", 8, true, rank::LONG),
        "unsigned long" | "unsigned long int" => int_ty("unsigned long", 8, false, rank::LONG),
        "long long" | "long long int" | "signed long long" => {
            int_ty("long long", 8, true, rank::LONG_LONG)
        }
        "unsigned long long" | "unsigned long long int" => {
            int_ty("unsigned long long", 8, false, rank::LONG_LONG)
        }
        "ptrdiff_t" => int_ty("ptrdiff_t", 8, true, rank::LONG),
        "size_t" => int_ty("size_t", 8, false, rank::LONG),
        "float" => Type::Floating(FloatingType { name: "float", size: 4 }),
        "double" => Type::Floating(FloatingType { name: "double", size: 8 }),
        _ => return None,
    })
}

// `Type` needs `Eq`/`Hash` only to serve as a cache key here; derive it
// locally rather than widening the public `PartialEq` impl's contract.
impl Eq for Type {}
impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Type::Integer(i) => {
                0u8.hash(state);
                i.name.hash(state);
                i.size.hash(state);
                i.signed.hash(state);
            }
            Type::Floating(f) => {
                1u8.hash(state);
                f.name.hash(state);
                f.size.hash(state);
            }
            Type::Boolean => 2u8.hash(state),
            Type::Pointer(p) => {
                3u8.hash(state);
                p.referent.hash(state);
                p.width.hash(state);
            }
            Type::Array(a) => {
                4u8.hash(state);
                a.element.hash(state);
                a.length.hash(state);
            }
            Type::Struct(id) => (5u8, id).hash(state),
            Type::Union(id) => (6u8, id).hash(state),
            Type::Enum(id) => (7u8, id).hash(state),
            Type::Typedef(id) => (8u8, id).hash(state),
            Type::Qualified(inner, q) => {
                9u8.hash(state);
                inner.hash(state);
                q.hash(state);
            }
        }
    }
}
impl std::hash::Hash for Qualifiers {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.contains(Qualifiers::CONST).hash(state);
        self.contains(Qualifiers::VOLATILE).hash(state);
        self.contains(Qualifiers::RESTRICT).hash(state);
        self.contains(Qualifiers::ATOMIC).hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_is_idempotent() {
        let catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        let qualified = Type::Qualified(Box::new(int_t.clone()), Qualifiers::CONST);
        let stripped = qualified.strip(&catalogue);
        assert_eq!(stripped, int_t);
        assert_eq!(stripped.strip(&catalogue), stripped);
    }

    #[test]
    fn pointer_constructor_is_memoized() {
        let catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        let p1 = catalogue.pointer(int_t.clone());
        let p2 = catalogue.pointer(int_t);
        assert_eq!(p1, p2);
    }

    #[test]
    fn incomplete_array_has_no_size() {
        let catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        let unknown_len = catalogue.array(int_t, None);
        assert!(matches!(
            catalogue.size_of(&unknown_len),
            Err(EvalError::IncompleteType { .. })
        ));
    }

    #[test]
    fn builtin_lookup_and_struct_lookup() {
        let mut catalogue = TypeCatalogue::new(8);
        assert!(catalogue.find("unsigned long").is_some());
        assert!(catalogue.find("struct foo").is_none());
        catalogue.register_struct("foo", Some(4), |_| Vec::new());
        assert!(matches!(catalogue.find("struct foo"), Some(Type::Struct(_))));
    }
}
