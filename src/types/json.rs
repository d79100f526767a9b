//! A small, crate-owned JSON interchange format for type catalogues,
//! used by the development CLI harness and by tests that want a
//! catalogue without hand-writing `register_struct` calls.
//!
//! This is *not* a DWARF wire format - a catalogue is ordinarily built
//! from DWARF by a client. This schema exists purely so the CLI harness
//! (and these tests) have something to point at without embedding a
//! DWARF reader.

use serde::Deserialize;

use crate::error::{EvalError, Result};
use crate::types::{Qualifiers, Type, TypeCatalogue};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum JsonTypeDef {
    Struct {
        name: String,
        size: Option<u64>,
        members: Vec<JsonMember>,
    },
    Union {
        name: String,
        size: Option<u64>,
        members: Vec<JsonMember>,
    },
    Enum {
        name: String,
        underlying: String,
        constants: Vec<(String, i128)>,
    },
    Typedef {
        name: String,
        target: String,
    },
}

#[derive(Debug, Deserialize)]
struct JsonMember {
    name: String,
    #[serde(default)]
    offset: u64,
    #[serde(rename = "type")]
    ty: String,
}

/// Parses a single C type spelling against an already-built catalogue.
/// Exposed for callers (the CLI harness's `--symbols` loader) that need
/// to resolve one-off type spellings outside of a full JSON catalogue
/// document.
pub fn type_from_spelling(catalogue: &TypeCatalogue, spelling: &str) -> Result<Type> {
    parse_spelling(catalogue, spelling)
}

impl TypeCatalogue {
    /// Parses a JSON array of type definitions (see module docs for the
    /// shape) into a fresh catalogue sized for `pointer_width`.
    ///
    /// Struct and union definitions are resolved in two passes so that
    /// later entries (and self-references) can be named by earlier
    /// ones' member type spellings - the same "reserve, then define"
    /// trick `register_struct` uses for a single definition.
    pub fn from_json(json: &str, pointer_width: u8) -> Result<TypeCatalogue> {
        let defs: Vec<JsonTypeDef> = serde_json::from_str(json).map_err(|e| EvalError::InvalidConstruction {
            message: format!("malformed type catalogue JSON: {e}"),
        })?;

        let mut catalogue = TypeCatalogue::new(pointer_width);
        let mut struct_ids = Vec::new();
        let mut union_ids = Vec::new();

        for def in &defs {
            match def {
                JsonTypeDef::Struct { name, .. } => {
                    struct_ids.push(catalogue.reserve_struct(name.clone()));
                }
                JsonTypeDef::Union { name, .. } => {
                    union_ids.push(catalogue.reserve_union(name.clone()));
                }
                JsonTypeDef::Enum { name, underlying, constants } => {
                    let underlying_ty = parse_spelling(&catalogue, underlying)?;
                    let Type::Integer(underlying_int) = underlying_ty else {
                        return Err(EvalError::TypeMismatch {
                            message: format!("enum '{name}' underlying type must be an integer"),
                        });
                    };
                    catalogue.register_enum(name.clone(), underlying_int, constants.clone());
                }
                JsonTypeDef::Typedef { name, target } => {
                    let target_ty = parse_spelling(&catalogue, target)?;
                    catalogue.register_typedef(name.clone(), target_ty);
                }
            }
        }

        let mut struct_iter = struct_ids.into_iter();
        let mut union_iter = union_ids.into_iter();
        for def in defs {
            match def {
                JsonTypeDef::Struct { size, members, .. } => {
                    let id = struct_iter.next().expect("one id reserved per struct def");
                    let members = resolve_members(&catalogue, members)?;
                    catalogue.define_struct(id, size, move |_| {
                        members
                            .into_iter()
                            .map(|(name, offset, ty)| crate::types::StructMember::new(name, offset, ty))
                            .collect()
                    });
                }
                JsonTypeDef::Union { size, members, .. } => {
                    let id = union_iter.next().expect("one id reserved per union def");
                    let members = resolve_members(&catalogue, members)?;
                    catalogue.define_union(id, size, move |_| {
                        members
                            .into_iter()
                            .map(|(name, _, ty)| crate::types::UnionMember::new(name, ty))
                            .collect()
                    });
                }
                JsonTypeDef::Enum { .. } | JsonTypeDef::Typedef { .. } => {}
            }
        }

        Ok(catalogue)
    }
}

fn resolve_members(catalogue: &TypeCatalogue, members: Vec<JsonMember>) -> Result<Vec<(String, u64, Type)>> {
    members
        .into_iter()
        .map(|m| Ok((m.name, m.offset, parse_spelling(catalogue, &m.ty)?)))
        .collect()
}

/// Parses a C type spelling (`"int"`, `"struct point *"`, `"char [16]"`,
/// `"const unsigned long"`) into a [`Type`], recursing outside-in through
/// array and pointer declarators and qualifier prefixes before falling
/// back to [`TypeCatalogue::find`] for the base type.
fn parse_spelling(catalogue: &TypeCatalogue, spelling: &str) -> Result<Type> {
    let s = spelling.trim();

    if let Some(open) = s.rfind('[') {
        if s.ends_with(']') {
            let base = &s[..open];
            let inner = s[open + 1..s.len() - 1].trim();
            let element = parse_spelling(catalogue, base)?;
            let length = if inner.is_empty() {
                None
            } else {
                Some(inner.parse::<u64>().map_err(|_| EvalError::TypeMismatch {
                    message: format!("invalid array length in type spelling '{spelling}'"),
                })?)
            };
            return Ok(catalogue.array(element, length));
        }
    }

    if let Some(base) = s.strip_suffix('*') {
        let referent = parse_spelling(catalogue, base.trim())?;
        return Ok(catalogue.pointer(referent));
    }

    for (prefix, qualifier) in [
        ("const ", Qualifiers::CONST),
        ("volatile ", Qualifiers::VOLATILE),
        ("restrict ", Qualifiers::RESTRICT),
        ("_Atomic ", Qualifiers::ATOMIC),
    ] {
        if let Some(rest) = s.strip_prefix(prefix) {
            let inner = parse_spelling(catalogue, rest)?;
            let existing = inner.qualifiers();
            return Ok(match inner {
                Type::Qualified(t, _) => Type::Qualified(t, existing.union(qualifier)),
                other => Type::Qualified(Box::new(other), qualifier),
            });
        }
    }

    catalogue.find(s).ok_or_else(|| EvalError::TypeMismatch {
        message: format!("unknown type spelling '{spelling}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builtin_and_struct() {
        let json = r#"[
            {"kind": "struct", "name": "point", "size": 8, "members": [
                {"name": "x", "offset": 0, "type": "int"},
                {"name": "y", "offset": 4, "type": "int"}
            ]}
        ]"#;
        let catalogue = TypeCatalogue::from_json(json, 8).unwrap();
        let point = catalogue.find("struct point").unwrap();
        assert_eq!(catalogue.size_of(&point).unwrap(), 8);
        let Type::Struct(id) = point else { panic!() };
        assert_eq!(catalogue.struct_def(id).members(&catalogue).len(), 2);
    }

    #[test]
    fn parses_self_referential_struct() {
        let json = r#"[
            {"kind": "struct", "name": "list_head", "size": 16, "members": [
                {"name": "next", "offset": 0, "type": "struct list_head *"},
                {"name": "prev", "offset": 8, "type": "struct list_head *"}
            ]}
        ]"#;
        let catalogue = TypeCatalogue::from_json(json, 8).unwrap();
        let list_head = catalogue.find("struct list_head").unwrap();
        let Type::Struct(id) = list_head else { panic!() };
        let members = catalogue.struct_def(id).members(&catalogue);
        assert!(matches!(members[0].ty, Type::Pointer(_)));
    }

    #[test]
    fn parses_enum_and_typedef() {
        let json = r#"[
            {"kind": "enum", "name": "color", "underlying": "int", "constants": [["RED", 0], ["GREEN", 1]]},
            {"kind": "typedef", "name": "u32_t", "target": "unsigned int"}
        ]"#;
        let catalogue = TypeCatalogue::from_json(json, 8).unwrap();
        assert!(matches!(catalogue.find("enum color"), Some(Type::Enum(_))));
        assert!(matches!(catalogue.find("u32_t"), Some(Type::Typedef(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(TypeCatalogue::from_json("not json", 8).is_err());
    }

    #[test]
    fn parses_array_and_qualified_members() {
        let json = r#"[
            {"kind": "struct", "name": "buf", "size": 20, "members": [
                {"name": "data", "offset": 0, "type": "char [16]"},
                {"name": "len", "offset": 16, "type": "const unsigned int"}
            ]}
        ]"#;
        let catalogue = TypeCatalogue::from_json(json, 8).unwrap();
        let buf = catalogue.find("struct buf").unwrap();
        let Type::Struct(id) = buf else { panic!() };
        let members = catalogue.struct_def(id).members(&catalogue);
        assert!(matches!(members[0].ty, Type::Array(_)));
        assert!(matches!(members[1].ty, Type::Qualified(..)));
    }
}
