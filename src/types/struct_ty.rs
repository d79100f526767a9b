use std::cell::RefCell;

use super::catalogue::TypeCatalogue;
use super::Type;

/// One member of a struct: its name, byte offset from the start of the
/// struct, and type.
#[derive(Clone)]
pub struct StructMember {
    pub name: String,
    pub offset: u64,
    pub ty: Type,
}

impl StructMember {
    pub fn new(name: impl Into<String>, offset: u64, ty: Type) -> Self {
        Self {
            name: name.into(),
            offset,
            ty,
        }
    }
}

type MembersThunk = Box<dyn FnOnce(&TypeCatalogue) -> Vec<StructMember>>;

enum MembersSlot {
    Pending(MembersThunk),
    Resolving,
    Resolved(Vec<StructMember>),
}

/// A struct's layout, as held by the catalogue.
///
/// Members are supplied as a thunk rather than a plain `Vec` so that two
/// structs can reference each other (`struct list_head` containing a
/// pointer to `struct list_head`) - the thunk is only invoked, and its
/// result memoized, the first time something actually asks for the
/// member list, by which point every named type the thunk refers to has
/// been registered.
pub struct StructDef {
    pub name: Option<String>,
    /// `None` for an incomplete struct (forward-declared, never defined).
    pub size: Option<u64>,
    members: RefCell<MembersSlot>,
}

impl StructDef {
    pub fn new(
        name: Option<String>,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<StructMember> + 'static,
    ) -> Self {
        Self {
            name,
            size,
            members: RefCell::new(MembersSlot::Pending(Box::new(members))),
        }
    }

    pub fn incomplete(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            size: None,
            members: RefCell::new(MembersSlot::Resolved(Vec::new())),
        }
    }

    /// Resolves (and memoizes) the member list, calling back into the
    /// catalogue on first access.
    pub fn members(&self, catalogue: &TypeCatalogue) -> Vec<StructMember> {
        let slot = self.members.replace(MembersSlot::Resolving);
        match slot {
            MembersSlot::Resolved(members) => {
                *self.members.borrow_mut() = MembersSlot::Resolved(members.clone());
                members
            }
            MembersSlot::Pending(thunk) => {
                let members = thunk(catalogue);
                *self.members.borrow_mut() = MembersSlot::Resolved(members.clone());
                members
            }
            MembersSlot::Resolving => {
                // A member thunk asked, directly or transitively, for this
                // same struct's own members while it was still being
                // resolved. That can only happen for a struct embedding
                // itself by value, which is not a valid C layout.
                *self.members.borrow_mut() = MembersSlot::Resolved(Vec::new());
                Vec::new()
            }
        }
    }

    pub fn member(&self, catalogue: &TypeCatalogue, name: &str) -> Option<StructMember> {
        self.members(catalogue).into_iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntegerType, PointerType};

    #[test]
    fn self_referential_struct_resolves_lazily() {
        let mut catalogue = TypeCatalogue::new(8);
        let list_head = catalogue.reserve_struct("list_head");
        catalogue.define_struct(list_head, Some(16), move |cat| {
            let self_ty = Type::Struct(list_head);
            let ptr = Type::Pointer(PointerType::new(self_ty, cat.pointer_width()));
            vec![
                StructMember::new("next", 0, ptr.clone()),
                StructMember::new("prev", 8, ptr),
            ]
        });

        let members = catalogue.struct_def(list_head).members(&catalogue);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "next");
        assert!(matches!(members[0].ty, Type::Pointer(_)));
    }

    #[test]
    fn member_lookup_by_name() {
        let mut catalogue = TypeCatalogue::new(8);
        let point = catalogue.reserve_struct("point");
        let int_ty = IntegerType {
            name: "int".into(),
            size: 4,
            signed: true,
            rank: crate::types::rank::INT,
        };
        catalogue.define_struct(point, Some(8), move |_| {
            vec![
                StructMember::new("x", 0, Type::Integer(int_ty.clone())),
                StructMember::new("y", 4, Type::Integer(int_ty)),
            ]
        });
        let def = catalogue.struct_def(point);
        assert!(def.member(&catalogue, "x").is_some());
        assert!(def.member(&catalogue, "z").is_none());
    }
}
