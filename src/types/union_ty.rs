use std::cell::RefCell;

use super::catalogue::TypeCatalogue;
use super::Type;

/// One member of a union. Unlike a struct member there is no offset field:
/// every union member shares offset 0 by construction.
#[derive(Clone)]
pub struct UnionMember {
    pub name: String,
    pub ty: Type,
}

impl UnionMember {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

type MembersThunk = Box<dyn FnOnce(&TypeCatalogue) -> Vec<UnionMember>>;

enum MembersSlot {
    Pending(MembersThunk),
    Resolving,
    Resolved(Vec<UnionMember>),
}

/// A union's layout, as held by the catalogue. See [`super::struct_ty::StructDef`]
/// for why members are a lazily-resolved thunk rather than a plain `Vec`.
pub struct UnionDef {
    pub name: Option<String>,
    pub size: Option<u64>,
    members: RefCell<MembersSlot>,
}

impl UnionDef {
    pub fn new(
        name: Option<String>,
        size: Option<u64>,
        members: impl FnOnce(&TypeCatalogue) -> Vec<UnionMember> + 'static,
    ) -> Self {
        Self {
            name,
            size,
            members: RefCell::new(MembersSlot::Pending(Box::new(members))),
        }
    }

    pub fn members(&self, catalogue: &TypeCatalogue) -> Vec<UnionMember> {
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
                *self.members.borrow_mut() = MembersSlot::Resolved(Vec::new());
                Vec::new()
            }
        }
    }

    pub fn member(&self, catalogue: &TypeCatalogue, name: &str) -> Option<UnionMember> {
        self.members(catalogue).into_iter().find(|m| m.name == name)
    }
}
