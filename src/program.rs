//! The facade a client actually holds: a core reader, a type catalogue,
//! a byte order, and an optional symbol resolver, tied together into a
//! factory for [`ProgramObject`]s.

use crate::error::{EvalError, Result};
use crate::object::{ProgramObject, Value};
use crate::reader::CoreReader;
use crate::types::{Type, TypeCatalogue};

/// Byte order of the image being inspected. Every multi-byte integer,
/// float, or pointer load honors this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A symbol resolver: looks up a global's type and address by name.
/// Boxed so the program can hold either a closure over a symbol table or
/// a thin wrapper around a DWARF-backed lookup.
pub type SymbolResolver<'a> = Box<dyn Fn(&str) -> Option<(Type, u64)> + 'a>;

/// Owns the image, the type catalogue, and (optionally) a symbol
/// resolver. Every [`ProgramObject`] borrows a `Program` for its
/// lifetime; dropping the program invalidates any objects still held.
pub struct Program<'a> {
    reader: CoreReader<'a>,
    catalogue: TypeCatalogue,
    byte_order: ByteOrder,
    resolver: Option<SymbolResolver<'a>>,
}

impl<'a> Program<'a> {
    pub fn new(reader: CoreReader<'a>, catalogue: TypeCatalogue, byte_order: ByteOrder) -> Self {
        Self {
            reader,
            catalogue,
            byte_order,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: SymbolResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn reader(&self) -> &CoreReader<'a> {
        &self.reader
    }

    pub fn catalogue(&self) -> &TypeCatalogue {
        &self.catalogue
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub(crate) fn decode_uint(&self, bytes: &[u8]) -> u64 {
        let mut buf = [0u8; 8];
        match self.byte_order {
            ByteOrder::Little => buf[..bytes.len()].copy_from_slice(bytes),
            ByteOrder::Big => buf[8 - bytes.len()..].copy_from_slice(bytes),
        }
        match self.byte_order {
            ByteOrder::Little => u64::from_le_bytes(buf),
            ByteOrder::Big => u64::from_be_bytes(buf),
        }
    }

    pub(crate) fn decode_float(&self, bytes: &[u8], size: u8) -> f64 {
        match (size, self.byte_order) {
            (4, ByteOrder::Little) => f32::from_le_bytes(bytes.try_into().unwrap()) as f64,
            (4, ByteOrder::Big) => f32::from_be_bytes(bytes.try_into().unwrap()) as f64,
            (8, ByteOrder::Little) => f64::from_le_bytes(bytes.try_into().unwrap()),
            (8, ByteOrder::Big) => f64::from_be_bytes(bytes.try_into().unwrap()),
            _ => unreachable!("floating types are only ever 4 or 8 bytes"),
        }
    }

    /// A reference object at a global symbol's address.
    ///
    /// Fails with [`EvalError::SymbolNotFound`] if no resolver is set or
    /// the resolver does not know `name`.
    pub fn variable<'p>(&'p self, name: &str) -> Result<ProgramObject<'a, 'p>> {
        let resolver = self.resolver.as_ref().ok_or_else(|| EvalError::SymbolNotFound {
            name: name.to_string(),
        })?;
        let (ty, address) = resolver(name).ok_or_else(|| EvalError::SymbolNotFound {
            name: name.to_string(),
        })?;
        log::trace!(
            "resolved symbol '{name}' to {} at {address:#x}",
            ty.spelling(&self.catalogue)
        );
        Ok(ProgramObject::new_reference(self, ty, address))
    }

    /// Constructs a program object of `ty`, either a reference object at
    /// `address` or a value object holding `value`.
    ///
    /// Exactly one of `address`/`value` must be provided, except for
    /// array/struct/union types with no complete layout requirement,
    /// which may be constructed with neither (an address-less, valueless
    /// placeholder is never produced by this crate's own callers, but
    /// downstream helpers that probe a type's shape before an address is
    /// known rely on it).
    pub fn object<'p>(
        &'p self,
        ty: Type,
        address: Option<u64>,
        value: Option<Value>,
    ) -> Result<ProgramObject<'a, 'p>> {
        if ty.is_void() {
            return Err(EvalError::InvalidConstruction {
                message: "cannot construct an object of type void".into(),
            });
        }
        match (address, value) {
            (Some(_), Some(_)) => Err(EvalError::InvalidConstruction {
                message: "object construction accepts an address or a value, not both".into(),
            }),
            (Some(addr), None) => Ok(ProgramObject::new_reference(self, ty, addr)),
            (None, Some(v)) => {
                let normalized = self.normalize_value(&ty, v)?;
                Ok(ProgramObject::new_value(self, ty, normalized))
            }
            (None, None) => {
                if matches!(
                    ty.strip(&self.catalogue),
                    Type::Array(_) | Type::Struct(_) | Type::Union(_)
                ) {
                    log::debug!("constructing an address-less, value-less {}", ty.spelling(&self.catalogue));
                    Ok(ProgramObject::new_value(self, ty.clone(), self.default_value(&ty)?))
                } else {
                    Err(EvalError::InvalidConstruction {
                        message: "scalar object construction requires an address or a value".into(),
                    })
                }
            }
        }
    }

    /// Normalizes a raw synthesized value into `ty`'s representation:
    /// integers are reduced modulo `2^width` and reinterpreted per
    /// signedness; floats are narrowed to the type's own precision.
    fn normalize_value(&self, ty: &Type, value: Value) -> Result<Value> {
        let cat = &self.catalogue;
        match (ty.strip(cat), value) {
            (Type::Integer(i), Value::Int(v)) => {
                Ok(Value::Int(crate::object::normalize_int(v, i.size, i.signed)))
            }
            (Type::Integer(i), Value::Pointer(p)) => {
                Ok(Value::Int(crate::object::normalize_int(p as i128, i.size, i.signed)))
            }
            (Type::Boolean, Value::Int(v)) => Ok(Value::Int((v != 0) as i128)),
            (Type::Enum(id), Value::Int(v)) => {
                let underlying = cat.enum_def(id).underlying.clone();
                Ok(Value::Int(crate::object::normalize_int(v, underlying.size, underlying.signed)))
            }
            (Type::Floating(f), Value::Float(v)) => {
                Ok(Value::Float(if f.size == 4 { (v as f32) as f64 } else { v }))
            }
            (Type::Floating(f), Value::Int(v)) => {
                Ok(Value::Float(if f.size == 4 { (v as f64 as f32) as f64 } else { v as f64 }))
            }
            (Type::Pointer(p), Value::Pointer(addr)) => {
                let mask = if p.width >= 8 { u64::MAX } else { (1u64 << (p.width as u32 * 8)) - 1 };
                Ok(Value::Pointer(addr & mask))
            }
            (Type::Pointer(p), Value::Int(v)) => {
                let mask = if p.width >= 8 { u64::MAX } else { (1u64 << (p.width as u32 * 8)) - 1 };
                Ok(Value::Pointer((v as u64) & mask))
            }
            (Type::Array(_), v @ Value::Array(_)) => Ok(v),
            (Type::Struct(_), v @ Value::Struct(_)) | (Type::Union(_), v @ Value::Struct(_)) => Ok(v),
            (_, v) => Err(EvalError::InvalidConstruction {
                message: format!("value {v:?} does not match type {}", ty.spelling(cat)),
            }),
        }
    }

    fn default_value(&self, ty: &Type) -> Result<Value> {
        let cat = &self.catalogue;
        match ty.strip(cat) {
            Type::Array(a) => {
                let len = a.length.unwrap_or(0) as usize;
                let elem_default = self.default_value(&a.element)?;
                Ok(Value::Array(vec![elem_default; len]))
            }
            Type::Struct(id) => {
                let members = cat.struct_def(id).members(cat);
                let mut fields = Vec::with_capacity(members.len());
                for m in members {
                    fields.push((m.name, self.default_value(&m.ty)?));
                }
                Ok(Value::Struct(fields))
            }
            Type::Union(id) => {
                let members = cat.union_def(id).members(cat);
                let mut fields = Vec::with_capacity(members.len());
                for m in members {
                    fields.push((m.name, self.default_value(&m.ty)?));
                }
                Ok(Value::Struct(fields))
            }
            Type::Floating(_) => Ok(Value::Float(0.0)),
            Type::Pointer(_) => Ok(Value::Pointer(0)),
            _ => Ok(Value::Int(0)),
        }
    }
}

/// Given a pointer `p` to `member` of `struct_type`, returns a pointer to
/// the enclosing struct. Free-function form of
/// [`ProgramObject::container_of_`], for callers that prefer it at the
/// module level rather than as a method.
pub fn container_of<'a, 'p>(
    obj: &ProgramObject<'a, 'p>,
    struct_type: &Type,
    member: &str,
) -> Result<ProgramObject<'a, 'p>> {
    obj.container_of_(struct_type, member)
}
