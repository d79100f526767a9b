//! Program objects: a typed view over either an address in the image or a
//! synthesized value, plus every C-semantics operation the evaluator
//! exposes on them.
//!
//! Every surface operation here follows the same shape: strip qualifiers
//! and typedefs down to a concrete variant, classify the operand kind(s),
//! consult [`crate::types::rules::TypeRules`] for the result type, then
//! either fetch bytes through the program's reader or fold synthesized
//! values directly.

use crate::error::{EvalError, Result};
use crate::program::Program;
use crate::types::rules::TypeRules;
use crate::types::{Type, TypeCatalogue};

/// A synthesized value held by a [`ProgramObject`] that has no backing
/// address. Integers are widened into `i128` so any C integer width (up
/// to 64 bits, signed or unsigned) fits without truncation; the type
/// attached to the object is what gives the stored bits their meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i128),
    Float(f64),
    Pointer(u64),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

#[derive(Debug, Clone)]
enum Kind {
    Reference(u64),
    Value(Value),
}

/// A typed program object: either a reference object (backed by an
/// address in the image) or a value object (a synthesized value with no
/// address). See the module docs for the operations this supports.
#[derive(Clone)]
pub struct ProgramObject<'a, 'p> {
    program: &'p Program<'a>,
    ty: Type,
    kind: Kind,
}

/// Reduces `raw` modulo `2^(size*8)` and reinterprets it with the
/// requested signedness - the normalization every integer value object
/// and every integer cast goes through.
pub(crate) fn normalize_int(raw: i128, size: u8, signed: bool) -> i128 {
    if size >= 16 {
        return raw;
    }
    let bits = size as u32 * 8;
    let mask: u128 = if bits == 128 { u128::MAX } else { (1u128 << bits) - 1 };
    let truncated = (raw as u128) & mask;
    if signed && bits > 0 && (truncated & (1u128 << (bits - 1))) != 0 {
        (truncated as i128) - (1i128 << bits)
    } else {
        truncated as i128
    }
}

impl<'a, 'p> ProgramObject<'a, 'p> {
    pub(crate) fn new_reference(program: &'p Program<'a>, ty: Type, address: u64) -> Self {
        Self {
            program,
            ty,
            kind: Kind::Reference(address),
        }
    }

    pub(crate) fn new_value(program: &'p Program<'a>, ty: Type, value: Value) -> Self {
        Self {
            program,
            ty,
            kind: Kind::Value(value),
        }
    }

    pub fn program(&self) -> &'p Program<'a> {
        self.program
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn catalogue(&self) -> &TypeCatalogue {
        self.program.catalogue()
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, Kind::Reference(_))
    }

    /// The object's address, if it is a reference object.
    pub fn address(&self) -> Option<u64> {
        match self.kind {
            Kind::Reference(addr) => Some(addr),
            Kind::Value(_) => None,
        }
    }

    fn stripped(&self) -> Type {
        self.ty.strip(self.catalogue())
    }

    fn with_value(&self, ty: Type, value: Value) -> Self {
        Self::new_value(self.program, ty, value)
    }

    fn with_reference(&self, ty: Type, address: u64) -> Self {
        Self::new_reference(self.program, ty, address)
    }

    // -- value access -------------------------------------------------

    /// Reads (or returns the already-synthesized) value of this object,
    /// recursively materializing array elements and struct/union members.
    pub fn value_(&self) -> Result<Value> {
        if let Kind::Value(v) = &self.kind {
            return Ok(v.clone());
        }
        let address = self.address().expect("reference object has an address");
        let cat = self.catalogue();
        match self.stripped() {
            Type::Integer(i) => {
                let bytes = self.program.reader().read(address, i.size as u64)?;
                Ok(Value::Int(normalize_int(
                    self.program.decode_uint(bytes) as i128,
                    i.size,
                    i.signed,
                )))
            }
            Type::Boolean => {
                let bytes = self.program.reader().read(address, 1)?;
                Ok(Value::Int(bytes[0] as i128))
            }
            Type::Enum(id) => {
                let underlying = cat.enum_def(id).underlying.clone();
                let bytes = self.program.reader().read(address, underlying.size as u64)?;
                Ok(Value::Int(normalize_int(
                    self.program.decode_uint(bytes) as i128,
                    underlying.size,
                    underlying.signed,
                )))
            }
            Type::Floating(f) => {
                let bytes = self.program.reader().read(address, f.size as u64)?;
                Ok(Value::Float(self.program.decode_float(bytes, f.size)))
            }
            Type::Pointer(p) => {
                let bytes = self.program.reader().read(address, p.width as u64)?;
                Ok(Value::Pointer(self.program.decode_uint(bytes)))
            }
            Type::Array(a) => {
                let len = a.length.ok_or(EvalError::UnboundedIteration)?;
                let elem_size = cat.size_of(&a.element)?;
                let mut values = Vec::with_capacity(len as usize);
                for i in 0..len {
                    let elem = self.with_reference(
                        (*a.element).clone(),
                        address + i * elem_size,
                    );
                    values.push(elem.value_()?);
                }
                Ok(Value::Array(values))
            }
            Type::Struct(id) | Type::Union(id) => {
                let members = self.members_of(id)?;
                let mut out = Vec::with_capacity(members.len());
                for (name, offset, ty) in members {
                    let member = self.with_reference(ty, address + offset);
                    out.push((name, member.value_()?));
                }
                Ok(Value::Struct(out))
            }
            Type::Typedef(_) | Type::Qualified(..) => unreachable!("stripped"),
        }
    }

    /// `(name, offset, type)` for every member of `id`, whether it names a
    /// struct (real per-member offsets) or a union (every member at 0).
    fn members_of(&self, id: crate::types::TypeId) -> Result<Vec<(String, u64, Type)>> {
        let cat = self.catalogue();
        if let Type::Struct(_) = self.stripped() {
            Ok(cat
                .struct_def(id)
                .members(cat)
                .into_iter()
                .map(|m| (m.name, m.offset, m.ty))
                .collect())
        } else {
            Ok(cat
                .union_def(id)
                .members(cat)
                .into_iter()
                .map(|m| (m.name, 0u64, m.ty))
                .collect())
        }
    }

    /// Extracts a NUL-terminated byte string from a `char *` or `char[]`
    /// object. Fails with [`EvalError::TypeMismatch`] for anything else.
    pub fn string_(&self) -> Result<Vec<u8>> {
        let cat = self.catalogue();
        match self.stripped() {
            Type::Pointer(p) if is_char(&p.referent, cat) => {
                let addr = self.pointer_target_address()?;
                Ok(self.program.reader().read_c_string(addr, 4096)?.to_vec())
            }
            Type::Array(a) if is_char(&a.element, cat) => {
                let address = self.address().ok_or(EvalError::TypeMismatch {
                    message: "string_() on a value-object array requires an address".into(),
                })?;
                match a.length {
                    Some(len) => {
                        let bytes = self.program.reader().read(address, len)?;
                        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                        Ok(bytes[..end].to_vec())
                    }
                    None => Ok(self.program.reader().read_c_string(address, 4096)?.to_vec()),
                }
            }
            _ => Err(EvalError::TypeMismatch {
                message: format!(
                    "string_() requires char* or char[], found {}",
                    self.ty.spelling(cat)
                ),
            }),
        }
    }

    fn pointer_target_address(&self) -> Result<u64> {
        match &self.kind {
            Kind::Value(Value::Pointer(addr)) => Ok(*addr),
            Kind::Reference(_) => match self.value_()? {
                Value::Pointer(addr) => Ok(addr),
                _ => unreachable!("pointer type must read back a Value::Pointer"),
            },
            Kind::Value(_) => Err(EvalError::TypeMismatch {
                message: "expected a pointer value".into(),
            }),
        }
    }

    // -- member / attribute access --------------------------------------

    /// Struct/union member access. Never auto-dereferences a pointer;
    /// see [`Self::attr_`] for the dereferencing variant.
    pub fn member_(&self, name: &str) -> Result<Self> {
        let cat = self.catalogue();
        let stripped = self.stripped();
        let id = match stripped {
            Type::Struct(id) | Type::Union(id) => id,
            _ => {
                return Err(EvalError::TypeMismatch {
                    message: format!(
                        "member_('{name}') requires a struct or union, found {}",
                        self.ty.spelling(cat)
                    )
                })
            }
        };
        let members = self.members_of(id)?;
        let (_, offset, ty) = members
            .into_iter()
            .find(|(n, _, _)| n == name)
            .ok_or_else(|| EvalError::UnknownMember {
                type_name: self.ty.spelling(cat),
                member: name.to_string(),
            })?;

        match &self.kind {
            Kind::Reference(base) => Ok(self.with_reference(ty, base + offset)),
            Kind::Value(Value::Struct(fields)) => {
                let value = fields
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| EvalError::UnknownMember {
                        type_name: self.ty.spelling(cat),
                        member: name.to_string(),
                    })?;
                Ok(self.with_value(ty, value))
            }
            Kind::Value(_) => Err(EvalError::TypeMismatch {
                message: "member_() on a value object requires a struct-shaped value".into(),
            }),
        }
    }

    /// Attribute-style member access: auto-dereferences one level of
    /// pointer-to-struct/union before resolving `name`.
    pub fn attr_(&self, name: &str) -> Result<Self> {
        let cat = self.catalogue();
        if let Type::Pointer(p) = self.stripped() {
            if matches!(p.referent.strip(cat), Type::Struct(_) | Type::Union(_)) {
                return self.deref()?.member_(name);
            }
        }
        self.member_(name)
    }

    // -- indexing / iteration ------------------------------------------

    fn element_type_and_stride(&self) -> Result<(Type, u64)> {
        let cat = self.catalogue();
        match self.stripped() {
            Type::Pointer(p) => {
                let stride = cat.size_of(&p.referent)?;
                Ok((*p.referent, stride))
            }
            Type::Array(a) => {
                let stride = cat.size_of(&a.element)?;
                Ok((*a.element, stride))
            }
            _ => Err(EvalError::TypeMismatch {
                message: format!(
                    "indexing requires a pointer or array, found {}",
                    self.ty.spelling(cat)
                ),
            }),
        }
    }

    /// `obj[index]`. Defined for pointer and array objects; index bounds
    /// are not checked for arrays with a known length, matching C.
    pub fn index(&self, index: i64) -> Result<Self> {
        let (elem_ty, stride) = self.element_type_and_stride()?;
        let base = match self.stripped() {
            Type::Pointer(_) => self.pointer_target_address()?,
            Type::Array(_) => self.address().ok_or(EvalError::TypeMismatch {
                message: "indexing a value-object array requires an address".into(),
            })?,
            _ => unreachable!(),
        };
        let offset = (index as i128) * (stride as i128);
        let address = (base as i128 + offset) as u64;
        Ok(self.with_reference(elem_ty, address))
    }

    /// The number of elements in an array of known length.
    ///
    /// Fails with [`EvalError::UnboundedIteration`] for an unknown-length
    /// array or a pointer (neither has a length).
    pub fn len(&self) -> Result<u64> {
        match self.stripped() {
            Type::Array(a) => a.length.ok_or(EvalError::UnboundedIteration),
            _ => Err(EvalError::UnboundedIteration),
        }
    }

    /// Every element as its own reference/value object, in order. Only
    /// arrays of known length are iterable.
    pub fn elements(&self) -> Result<Vec<Self>> {
        let len = self.len()?;
        (0..len as i64).map(|i| self.index(i)).collect()
    }

    // -- address-of / container_of --------------------------------------

    /// Yields a pointer value object holding this reference object's
    /// address. Undefined for value objects.
    pub fn address_of_(&self) -> Result<Self> {
        let addr = self.address().ok_or(EvalError::NoAddress)?;
        let ptr_ty = self.catalogue().pointer(self.ty.clone());
        Ok(self.with_value(ptr_ty, Value::Pointer(addr)))
    }

    fn deref(&self) -> Result<Self> {
        match self.stripped() {
            Type::Pointer(p) => {
                let addr = self.pointer_target_address()?;
                if addr == 0 {
                    log::warn!("dereferencing a null {}", self.ty.spelling(self.catalogue()));
                }
                Ok(self.with_reference((*p.referent).clone(), addr))
            }
            _ => Err(EvalError::TypeMismatch {
                message: format!("cannot dereference {}", self.ty.spelling(self.catalogue())),
            }),
        }
    }

    /// Given `self` is a pointer to `member` of `struct_type`, returns a
    /// pointer to the enclosing struct.
    pub fn container_of_(&self, struct_type: &Type, member: &str) -> Result<Self> {
        let cat = self.catalogue();
        let id = match struct_type.strip(cat) {
            Type::Struct(id) => id,
            _ => {
                return Err(EvalError::TypeMismatch {
                    message: "container_of_ requires a struct type".into(),
                })
            }
        };
        if !matches!(self.stripped(), Type::Pointer(_)) {
            return Err(EvalError::TypeMismatch {
                message: "container_of_ requires a pointer object".into(),
            });
        }
        let def = cat.struct_def(id);
        let offset = def
            .member(cat, member)
            .ok_or_else(|| EvalError::UnknownMember {
                type_name: struct_type.spelling(cat),
                member: member.to_string(),
            })?
            .offset;
        let addr = self.pointer_target_address()?;
        let container_addr = addr.wrapping_sub(offset);
        let ptr_ty = cat.pointer(struct_type.clone());
        Ok(self.with_value(ptr_ty, Value::Pointer(container_addr)))
    }

    // -- cast -------------------------------------------------------

    /// Casts this object to `target`, applying the C conversion rules for
    /// the (source, destination) pair.
    pub fn cast_(&self, target: Type) -> Result<Self> {
        let cat = self.catalogue();
        let src = self.stripped();
        let dst = target.strip(cat);

        if let (Type::Struct(a), Type::Struct(b)) | (Type::Union(a), Type::Union(b)) = (&src, &dst) {
            if a == b {
                return Ok(self.with_value(target, self.value_()?));
            }
        }
        if matches!(dst, Type::Struct(_) | Type::Union(_)) || matches!(src, Type::Struct(_) | Type::Union(_)) {
            return Err(EvalError::TypeMismatch {
                message: "cannot cast to/from a struct or union of a different type".into(),
            });
        }

        let value = match (&src, &dst) {
            (Type::Floating(_), Type::Floating(fb)) => {
                let f = self.as_f64()?;
                Value::Float(if fb.size == 4 { (f as f32) as f64 } else { f })
            }
            (Type::Floating(_), Type::Integer(ib)) => {
                Value::Int(normalize_int(self.as_f64()?.trunc() as i128, ib.size, ib.signed))
            }
            (Type::Floating(_), Type::Boolean) => Value::Int((self.as_f64()? != 0.0) as i128),
            (Type::Floating(_), Type::Pointer(_)) => {
                return Err(EvalError::TypeMismatch {
                    message: "cannot cast a float to a pointer".into(),
                })
            }
            (_, Type::Floating(fb)) => {
                let v = self.as_i128()? as f64;
                Value::Float(if fb.size == 4 { (v as f32) as f64 } else { v })
            }
            (_, Type::Pointer(p)) => {
                let bits = self.as_i128()? as u128 & ((1u128 << (p.width as u32 * 8)) - 1);
                Value::Pointer(bits as u64)
            }
            (Type::Pointer(_), Type::Integer(ib)) => {
                Value::Int(normalize_int(self.pointer_target_address()? as i128, ib.size, ib.signed))
            }
            (Type::Pointer(_), Type::Boolean) => {
                Value::Int((self.pointer_target_address()? != 0) as i128)
            }
            (_, Type::Integer(ib)) => Value::Int(normalize_int(self.as_i128()?, ib.size, ib.signed)),
            (_, Type::Boolean) => Value::Int((self.as_i128()? != 0) as i128),
            (_, Type::Enum(id)) => {
                let underlying = cat.enum_def(*id).underlying.clone();
                Value::Int(normalize_int(self.as_i128()?, underlying.size, underlying.signed))
            }
            _ => {
                return Err(EvalError::TypeMismatch {
                    message: format!(
                        "cannot cast {} to {}",
                        self.ty.spelling(cat),
                        target.spelling(cat)
                    ),
                })
            }
        };
        Ok(self.with_value(target, value))
    }

    fn as_i128(&self) -> Result<i128> {
        match self.value_()? {
            Value::Int(v) => Ok(v),
            Value::Pointer(p) => Ok(p as i128),
            Value::Float(f) => Ok(f.trunc() as i128),
            _ => Err(EvalError::TypeMismatch {
                message: "expected a scalar value".into(),
            }),
        }
    }

    fn as_f64(&self) -> Result<f64> {
        match self.value_()? {
            Value::Float(f) => Ok(f),
            Value::Int(v) => Ok(v as f64),
            _ => Err(EvalError::TypeMismatch {
                message: "expected a scalar value".into(),
            }),
        }
    }

    // -- unary -------------------------------------------------------

    pub fn unary_plus(&self) -> Result<Self> {
        let cat = self.catalogue();
        require_arithmetic(cat, &self.stripped(), "unary +")?;
        let promoted = TypeRules::integer_promote_or_float(cat, &self.ty);
        let value = if promoted.is_floating(cat) {
            Value::Float(self.as_f64()?)
        } else {
            let size = cat.size_of(&promoted)? as u8;
            let signed = is_signed(&promoted, cat);
            Value::Int(normalize_int(self.as_i128()?, size, signed))
        };
        Ok(self.with_value(promoted, value))
    }

    pub fn unary_neg(&self) -> Result<Self> {
        let cat = self.catalogue();
        require_arithmetic(cat, &self.stripped(), "unary -")?;
        let promoted = TypeRules::integer_promote_or_float(cat, &self.ty);
        let value = if promoted.is_floating(cat) {
            Value::Float(-self.as_f64()?)
        } else {
            let size = cat.size_of(&promoted)? as u8;
            let signed = is_signed(&promoted, cat);
            Value::Int(normalize_int(-self.as_i128()?, size, signed))
        };
        Ok(self.with_value(promoted, value))
    }

    pub fn unary_not(&self) -> Result<Self> {
        let cat = self.catalogue();
        if !self.stripped().is_integer(cat) {
            return Err(EvalError::TypeMismatch {
                message: format!("~ requires an integer, found {}", self.ty.spelling(cat)),
            });
        }
        let promoted = TypeRules::integer_promote(cat, &self.ty);
        let size = cat.size_of(&promoted)? as u8;
        let signed = is_signed(&promoted, cat);
        let raw = !self.as_i128()?;
        Ok(self.with_value(promoted, Value::Int(normalize_int(raw, size, signed))))
    }

    // -- truthiness ----------------------------------------------------

    pub fn truthy(&self) -> Result<bool> {
        let cat = self.catalogue();
        match self.stripped() {
            Type::Pointer(_) => Ok(self.pointer_target_address()? != 0),
            Type::Floating(_) => Ok(self.as_f64()? != 0.0),
            _ if self.stripped().is_integer(cat) => Ok(self.as_i128()? != 0),
            _ => Err(EvalError::TypeMismatch {
                message: format!("{} has no truth value", self.ty.spelling(cat)),
            }),
        }
    }

    // -- rounding ------------------------------------------------------

    fn round_like(&self, f: impl Fn(f64) -> f64) -> Result<Self> {
        let cat = self.catalogue();
        let stripped = self.stripped();
        if stripped.is_integer(cat) {
            return Ok(self.clone());
        }
        match stripped {
            Type::Floating(ft) => {
                let rounded = f(self.as_f64()?);
                let value = if ft.size == 4 { (rounded as f32) as f64 } else { rounded };
                Ok(self.with_value(self.ty.clone(), Value::Float(value)))
            }
            _ => Err(EvalError::TypeMismatch {
                message: format!("rounding requires an arithmetic type, found {}", self.ty.spelling(cat)),
            }),
        }
    }

    pub fn round_(&self) -> Result<Self> {
        self.round_like(|f| f.round())
    }

    pub fn trunc_(&self) -> Result<Self> {
        self.round_like(|f| f.trunc())
    }

    pub fn floor_(&self) -> Result<Self> {
        self.round_like(|f| f.floor())
    }

    pub fn ceil_(&self) -> Result<Self> {
        self.round_like(|f| f.ceil())
    }

    /// An array operand decays to a pointer to its first element in a
    /// value context (used by arithmetic and relational comparison) -
    /// C11 S6.3.2.1. Only meaningful for a reference object, since the
    /// decayed pointer's value is the array's own address; a
    /// synthesized array value has no address to decay to.
    fn decay_for_value_context(&self) -> Result<Self> {
        let cat = self.catalogue();
        match self.stripped() {
            Type::Array(_) => {
                let address = self.address().ok_or(EvalError::TypeMismatch {
                    message: "cannot decay a value-object array with no address".into(),
                })?;
                let ptr_ty = TypeRules::decay(cat, &self.ty);
                Ok(self.with_value(ptr_ty, Value::Pointer(address)))
            }
            _ => Ok(self.clone()),
        }
    }

    // -- binary arithmetic -----------------------------------------------

    /// `+`/`-`/`*`/`/`/`%`, dispatching across {int,float,pointer}.
    pub fn arith(&self, op: ArithOp, rhs: &Self) -> Result<Self> {
        let lhs = self.decay_for_value_context()?;
        let rhs = rhs.decay_for_value_context()?;
        lhs.arith_impl(op, &rhs)
    }

    fn arith_impl(&self, op: ArithOp, rhs: &Self) -> Result<Self> {
        let cat = self.catalogue();
        let (lhs_ptr, rhs_ptr) = (self.stripped().is_pointer(cat), rhs.stripped().is_pointer(cat));

        if lhs_ptr || rhs_ptr {
            return self.pointer_arith(op, rhs);
        }

        require_arithmetic(cat, &self.stripped(), op.symbol())?;
        require_arithmetic(cat, &rhs.stripped(), op.symbol())?;
        let common = TypeRules::usual_arithmetic_conversions(cat, &self.ty, &rhs.ty);
        if common.is_floating(cat) {
            let a = self.as_f64()?;
            let b = rhs.as_f64()?;
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => return Err(EvalError::TypeMismatch {
                    message: "% requires integer operands".into(),
                }),
            };
            return Ok(self.with_value(common, Value::Float(result)));
        }
        let size = cat.size_of(&common)? as u8;
        let signed = is_signed(&common, cat);
        let a = self.as_i128()?;
        let b = rhs.as_i128()?;
        let raw = match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(EvalError::DivideByZero);
                }
                div_trunc(a, b, signed, size)
            }
            ArithOp::Rem => {
                if b == 0 {
                    return Err(EvalError::DivideByZero);
                }
                rem_trunc(a, b, signed, size)
            }
        };
        Ok(self.with_value(common, Value::Int(normalize_int(raw, size, signed))))
    }

    fn pointer_arith(&self, op: ArithOp, rhs: &Self) -> Result<Self> {
        let cat = self.catalogue();
        let lhs_is_ptr = self.stripped().is_pointer(cat);
        let rhs_is_ptr = rhs.stripped().is_pointer(cat);

        if lhs_is_ptr && rhs_is_ptr {
            if op != ArithOp::Sub {
                return Err(EvalError::TypeMismatch {
                    message: "only pointer - pointer is defined".into(),
                });
            }
            let (Type::Pointer(pa), Type::Pointer(pb)) = (self.stripped(), rhs.stripped()) else {
                unreachable!()
            };
            if !TypeRules::pointers_compatible(cat, &pa, &pb) {
                return Err(EvalError::TypeMismatch {
                    message: "pointer - pointer requires compatible referents".into(),
                });
            }
            let stride = cat.size_of(&pa.referent)?.max(1) as i128;
            let a = self.pointer_target_address()? as i128;
            let b = rhs.pointer_target_address()? as i128;
            let diff = (a - b) / stride;
            let ptrdiff = cat.find("ptrdiff_t").expect("builtin ptrdiff_t");
            return Ok(self.with_value(ptrdiff, Value::Int(diff)));
        }

        if op != ArithOp::Add && op != ArithOp::Sub {
            return Err(EvalError::TypeMismatch {
                message: "pointers only support + and -".into(),
            });
        }

        let (ptr, int_obj, ptr_is_lhs) = if lhs_is_ptr {
            (self, rhs, true)
        } else {
            (rhs, self, false)
        };
        if !int_obj.stripped().is_integer(cat) {
            return Err(EvalError::TypeMismatch {
                message: "pointer arithmetic requires an integer operand".into(),
            });
        }
        if op == ArithOp::Sub && !ptr_is_lhs {
            return Err(EvalError::TypeMismatch {
                message: "integer - pointer is not defined".into(),
            });
        }
        let Type::Pointer(p) = ptr.stripped() else {
            unreachable!()
        };
        let stride = cat.size_of(&p.referent)?.max(1) as i128;
        let base = ptr.pointer_target_address()? as i128;
        let k = int_obj.as_i128()?;
        let delta = k * stride;
        let result = if op == ArithOp::Add { base + delta } else { base - delta };
        Ok(self.with_value(ptr.ty.clone(), Value::Pointer(result as u64)))
    }

    // -- shift ---------------------------------------------------------

    pub fn shift(&self, left: bool, rhs: &Self) -> Result<Self> {
        let cat = self.catalogue();
        if !self.stripped().is_integer(cat) || !rhs.stripped().is_integer(cat) {
            return Err(EvalError::TypeMismatch {
                message: "shift requires integer operands".into(),
            });
        }
        let result_ty = TypeRules::integer_promote(cat, &self.ty);
        let size = cat.size_of(&result_ty)? as u8;
        let signed = is_signed(&result_ty, cat);
        let bits = (size as u32 * 8).max(1);
        let count = (rhs.as_i128()? as i64).rem_euclid(bits as i64) as u32 & (bits - 1);
        let a = self.as_i128()?;
        let ua = (a as u128) & mask_for(size);
        let raw = if left {
            ua.wrapping_shl(count)
        } else if signed {
            ((a as i128) >> count.min(bits - 1)) as u128 & mask_for(size)
        } else {
            ua.wrapping_shr(count)
        };
        Ok(self.with_value(result_ty, Value::Int(normalize_int(raw as i128, size, signed))))
    }

    // -- bitwise --------------------------------------------------------

    pub fn bitwise(&self, op: BitOp, rhs: &Self) -> Result<Self> {
        let cat = self.catalogue();
        if !self.stripped().is_integer(cat) || !rhs.stripped().is_integer(cat) {
            return Err(EvalError::TypeMismatch {
                message: format!("{} requires integer operands", op.symbol()),
            });
        }
        let common = TypeRules::usual_arithmetic_conversions(cat, &self.ty, &rhs.ty);
        let size = cat.size_of(&common)? as u8;
        let signed = is_signed(&common, cat);
        let a = (self.as_i128()? as u128) & mask_for(size);
        let b = (rhs.as_i128()? as u128) & mask_for(size);
        let raw = match op {
            BitOp::And => a & b,
            BitOp::Or => a | b,
            BitOp::Xor => a ^ b,
        };
        Ok(self.with_value(common, Value::Int(normalize_int(raw as i128, size, signed))))
    }

    // -- relational / equality -------------------------------------------

    /// Shared implementation for `<`,`<=`,`==`,`!=`,`>`,`>=`. `==`/`!=` are
    /// also reachable via [`Self::equals`], which additionally allows
    /// comparing across unrelated types (always `false`, never an error)
    /// the way `PartialEq` on program objects should behave.
    pub fn compare(&self, op: CmpOp, rhs: &Self) -> Result<bool> {
        let lhs = self.decay_for_value_context()?;
        let rhs = rhs.decay_for_value_context()?;
        lhs.compare_impl(op, &rhs)
    }

    fn compare_impl(&self, op: CmpOp, rhs: &Self) -> Result<bool> {
        let cat = self.catalogue();
        let (lhs_ptr, rhs_ptr) = (self.stripped().is_pointer(cat), rhs.stripped().is_pointer(cat));

        if lhs_ptr && rhs_ptr {
            let (Type::Pointer(pa), Type::Pointer(pb)) = (self.stripped(), rhs.stripped()) else {
                unreachable!()
            };
            if !TypeRules::pointers_compatible(cat, &pa, &pb) {
                return Err(EvalError::TypeMismatch {
                    message: "pointer comparison requires compatible referents".into(),
                });
            }
            let a = self.pointer_target_address()?;
            let b = rhs.pointer_target_address()?;
            return Ok(op.eval_unsigned(a as i128, b as i128));
        }
        if lhs_ptr != rhs_ptr {
            // `p == 0` / `0 == p` is allowed as a null-pointer check; any
            // other pointer-vs-integer comparison is a type mismatch.
            let (ptr, other) = if lhs_ptr { (self, rhs) } else { (rhs, self) };
            if matches!(op, CmpOp::Eq | CmpOp::Ne) && other.as_i128().unwrap_or(1) == 0 {
                let addr = ptr.pointer_target_address()? as i128;
                return Ok(op.eval_unsigned(addr, 0));
            }
            return Err(EvalError::TypeMismatch {
                message: "cannot compare a pointer with a non-pointer, non-zero value".into(),
            });
        }

        require_arithmetic(cat, &self.stripped(), op.symbol())?;
        require_arithmetic(cat, &rhs.stripped(), op.symbol())?;
        let common = TypeRules::usual_arithmetic_conversions(cat, &self.ty, &rhs.ty);
        if common.is_floating(cat) {
            Ok(op.eval_float(self.as_f64()?, rhs.as_f64()?))
        } else if is_signed(&common, cat) {
            Ok(op.eval_signed(self.as_i128()?, rhs.as_i128()?))
        } else {
            // Both operands must be reinterpreted at the *common* type's
            // width before the unsigned compare - a negative i128 sign-extends
            // across all 128 bits, which only matches the intended
            // zero-extended bit pattern once masked down to `common`'s size.
            let size = cat.size_of(&common)? as u8;
            let a = (self.as_i128()? as u128) & mask_for(size);
            let b = (rhs.as_i128()? as u128) & mask_for(size);
            Ok(op.eval_unsigned(a as i128, b as i128))
        }
    }

    /// Equality that never errors: operands of incompatible kinds (e.g. a
    /// pointer against a struct) simply compare unequal, matching
    /// `PartialEq`'s total-function contract.
    pub fn equals(&self, rhs: &Self) -> bool {
        self.compare(CmpOp::Eq, rhs).unwrap_or(false)
    }
}

impl<'a, 'p> std::fmt::Debug for ProgramObject<'a, 'p> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramObject")
            .field("ty", &self.ty.spelling(self.catalogue()))
            .field("kind", &self.kind)
            .finish()
    }
}

impl<'a, 'p> PartialEq for ProgramObject<'a, 'p> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

fn is_char(ty: &Type, cat: &TypeCatalogue) -> bool {
    matches!(ty.strip(cat), Type::Integer(i) if i.name.ends_with("char"))
}

fn is_signed(ty: &Type, cat: &TypeCatalogue) -> bool {
    match ty.strip(cat) {
        Type::Integer(i) => i.signed,
        Type::Boolean => false,
        Type::Enum(id) => cat.enum_def(id).underlying.signed,
        _ => true,
    }
}

fn require_arithmetic(cat: &TypeCatalogue, ty: &Type, op: &str) -> Result<()> {
    if ty.is_arithmetic(cat) {
        Ok(())
    } else {
        Err(EvalError::TypeMismatch {
            message: format!("{op} requires an arithmetic operand, found {}", ty.spelling(cat)),
        })
    }
}

fn mask_for(size: u8) -> u128 {
    let bits = size as u32 * 8;
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Divides/remainders `a` by `b`, reinterpreting both through `common`'s
/// signedness and width first - doing the arithmetic in the widest
/// unsigned representation and reinterpreting avoids host-language UB on
/// overflow while matching C's truncate-toward-zero `/` and
/// dividend-signed `%`.
fn div_trunc(a: i128, b: i128, signed: bool, size: u8) -> i128 {
    if signed {
        // i128 division already truncates toward zero.
        if a == i128::MIN && b == -1 {
            a
        } else {
            a / b
        }
    } else {
        let ua = a as u128 & mask_for(size);
        let ub = b as u128 & mask_for(size);
        (ua / ub) as i128
    }
}

fn rem_trunc(a: i128, b: i128, signed: bool, size: u8) -> i128 {
    if signed {
        if a == i128::MIN && b == -1 {
            0
        } else {
            a % b
        }
    } else {
        let ua = a as u128 & mask_for(size);
        let ub = b as u128 & mask_for(size);
        (ua % ub) as i128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    fn symbol(self) -> &'static str {
        match self {
            BitOp::And => "&",
            BitOp::Or => "|",
            BitOp::Xor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn eval_signed(self, a: i128, b: i128) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    fn eval_unsigned(self, a: i128, b: i128) -> bool {
        let (ua, ub) = (a as u128, b as u128);
        match self {
            CmpOp::Lt => ua < ub,
            CmpOp::Le => ua <= ub,
            CmpOp::Eq => ua == ub,
            CmpOp::Ne => ua != ub,
            CmpOp::Gt => ua > ub,
            CmpOp::Ge => ua >= ub,
        }
    }

    fn eval_float(self, a: f64, b: f64) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }
}

// Operator sugar over the named methods above. Every one of these can
// fail (division by zero, incompatible operand kinds), so `Output` is a
// `Result` rather than `Self` - the caller still writes `(&a + &b)?`.
macro_rules! arith_op_impl {
    ($trait_:ident, $method:ident, $op:expr) => {
        impl<'a, 'p> std::ops::$trait_ for &ProgramObject<'a, 'p> {
            type Output = Result<ProgramObject<'a, 'p>>;
            fn $method(self, rhs: Self) -> Self::Output {
                self.arith($op, rhs)
            }
        }
    };
}

arith_op_impl!(Add, add, ArithOp::Add);
arith_op_impl!(Sub, sub, ArithOp::Sub);
arith_op_impl!(Mul, mul, ArithOp::Mul);
arith_op_impl!(Div, div, ArithOp::Div);
arith_op_impl!(Rem, rem, ArithOp::Rem);

impl<'a, 'p> std::ops::BitAnd for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn bitand(self, rhs: Self) -> Self::Output {
        self.bitwise(BitOp::And, rhs)
    }
}

impl<'a, 'p> std::ops::BitOr for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.bitwise(BitOp::Or, rhs)
    }
}

impl<'a, 'p> std::ops::BitXor for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn bitxor(self, rhs: Self) -> Self::Output {
        self.bitwise(BitOp::Xor, rhs)
    }
}

impl<'a, 'p> std::ops::Shl for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn shl(self, rhs: Self) -> Self::Output {
        self.shift(true, rhs)
    }
}

impl<'a, 'p> std::ops::Shr for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn shr(self, rhs: Self) -> Self::Output {
        self.shift(false, rhs)
    }
}

impl<'a, 'p> std::ops::Neg for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn neg(self) -> Self::Output {
        self.unary_neg()
    }
}

impl<'a, 'p> std::ops::Not for &ProgramObject<'a, 'p> {
    type Output = Result<ProgramObject<'a, 'p>>;
    fn not(self) -> Self::Output {
        self.unary_not()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ByteOrder, Program};
    use crate::reader::{CoreReader, Segment};
    use rstest::rstest;

    // Bytes at 0xffff0000: two little-endian ints (1, 2) followed by the
    // NUL-terminated string "hello".
    const SAMPLE: &[u8] = &[
        1, 0, 0, 0, 2, 0, 0, 0, b'h', b'e', b'l', b'l', b'o', 0, 0, 0,
    ];

    fn sample_program() -> Program<'static> {
        let reader = CoreReader::new(SAMPLE, vec![Segment::new(0xffff_0000, SAMPLE.len() as u64, 0)]);
        Program::new(reader, TypeCatalogue::new(8), ByteOrder::Little)
    }

    fn point_program() -> Program<'static> {
        let data: &'static [u8] = &[3, 0, 0, 0, 4, 0, 0, 0];
        let reader = CoreReader::new(data, vec![Segment::new(0x1000, data.len() as u64, 0)]);
        let mut catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        catalogue.register_struct("point", Some(8), move |_| {
            vec![
                crate::types::StructMember::new("x", 0, int_t.clone()),
                crate::types::StructMember::new("y", 4, int_t),
            ]
        });
        Program::new(reader, catalogue, ByteOrder::Little)
    }

    // Scenario 1: reference objects read back the right int at each address.
    #[test]
    fn scenario_reads_two_ints() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let a = program.object(int_t.clone(), Some(0xffff_0000), None).unwrap();
        let b = program.object(int_t, Some(0xffff_0004), None).unwrap();
        assert_eq!(a.value_().unwrap(), Value::Int(1));
        assert_eq!(b.value_().unwrap(), Value::Int(2));
    }

    // Scenario 2: a pointer value object indexes like an array.
    #[test]
    fn scenario_pointer_index_reads_third_int() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let ptr_t = program.catalogue().pointer(int_t);
        let p = program.object(ptr_t, None, Some(Value::Pointer(0xffff_0000))).unwrap();
        let third = p.index(2).unwrap();
        assert_eq!(third.value_().unwrap(), Value::Int(0x6c6c_6568));
    }

    // Scenario 3: char* string extraction.
    #[test]
    fn scenario_char_pointer_string() {
        let program = sample_program();
        let char_t = program.catalogue().find("char").unwrap();
        let ptr_t = program.catalogue().pointer(char_t);
        let p = program.object(ptr_t, None, Some(Value::Pointer(0xffff_0008))).unwrap();
        assert_eq!(p.string_().unwrap(), b"hello");
    }

    // Scenario 4: cast round-trips -1 through unsigned int.
    #[test]
    fn scenario_cast_negative_to_unsigned() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let uint_t = program.catalogue().find("unsigned int").unwrap();
        let v = program.object(int_t, None, Some(Value::Int(-1))).unwrap();
        let cast = v.cast_(uint_t).unwrap();
        assert_eq!(cast.value_().unwrap(), Value::Int(0xffff_ffff));
    }

    // Scenario 5: -1 vs 0u compares false (usual arithmetic conversions make
    // -1 an enormous unsigned value).
    #[test]
    fn scenario_signed_unsigned_comparison() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let uint_t = program.catalogue().find("unsigned int").unwrap();
        let a = program.object(int_t, None, Some(Value::Int(-1))).unwrap();
        let b = program.object(uint_t, None, Some(Value::Int(0))).unwrap();
        assert!(!a.compare(CmpOp::Lt, &b).unwrap());
    }

    // Scenario 6: truncate-toward-zero division and dividend-signed remainder.
    #[test]
    fn scenario_truncating_division_and_remainder() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let three = program.object(int_t.clone(), None, Some(Value::Int(3))).unwrap();
        let two = program.object(int_t.clone(), None, Some(Value::Int(2))).unwrap();
        let one = program.object(int_t.clone(), None, Some(Value::Int(1))).unwrap();
        assert_eq!(three.arith(ArithOp::Div, &two).unwrap().value_().unwrap(), one.value_().unwrap());

        let neg_one = program.object(int_t.clone(), None, Some(Value::Int(-1))).unwrap();
        let twenty_six = program.object(int_t, None, Some(Value::Int(26))).unwrap();
        let rem = neg_one.arith(ArithOp::Rem, &twenty_six).unwrap();
        assert_eq!(rem.value_().unwrap(), Value::Int(-1));
    }

    // Scenario 7: rendering a char pointer at the final NUL yields an empty string.
    #[test]
    fn scenario_render_pointer_at_final_nul() {
        let program = sample_program();
        let char_t = program.catalogue().find("char").unwrap();
        let ptr_t = program.catalogue().pointer(char_t);
        let p = program.object(ptr_t, None, Some(Value::Pointer(0xffff_000f))).unwrap();
        assert_eq!(crate::render::render(&p), "(char *)0xffff000f = \"\"");
    }

    // Scenario 8: rounding a double keeps it a float of the same width.
    #[test]
    fn scenario_round_keeps_float_type() {
        let program = sample_program();
        let double_t = program.catalogue().find("double").unwrap();
        let v = program.object(double_t, None, Some(Value::Float(1.5))).unwrap();
        let rounded = v.round_().unwrap();
        assert_eq!(rounded.value_().unwrap(), Value::Float(2.0));
        assert!(rounded.ty().is_floating(rounded.catalogue()));
    }

    // Scenario 9: construction requires exactly one of address/value for scalars.
    #[test]
    fn scenario_construction_requires_exactly_one() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        assert!(matches!(
            program.object(int_t.clone(), Some(0xffff_0000), Some(Value::Int(1))),
            Err(EvalError::InvalidConstruction { .. })
        ));
        assert!(matches!(
            program.object(int_t, None, None),
            Err(EvalError::InvalidConstruction { .. })
        ));
    }

    // Scenario 10: known-length arrays iterate; unknown-length arrays and
    // pointers fail length/iteration but still support indexing.
    #[test]
    fn scenario_array_length_and_iteration() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let array_t = program.catalogue().array(int_t.clone(), Some(2));
        let arr = program.object(array_t, Some(0xffff_0000), None).unwrap();
        assert_eq!(arr.len().unwrap(), 2);
        assert_eq!(arr.elements().unwrap().len(), 2);

        let unknown_t = program.catalogue().array(int_t.clone(), None);
        let unknown = program.object(unknown_t, Some(0xffff_0000), None).unwrap();
        assert!(matches!(unknown.len(), Err(EvalError::UnboundedIteration)));
        assert!(unknown.index(1).is_ok());

        let ptr_t = program.catalogue().pointer(int_t);
        let ptr = program.object(ptr_t, None, Some(Value::Pointer(0xffff_0000))).unwrap();
        assert!(matches!(ptr.len(), Err(EvalError::UnboundedIteration)));
        assert!(ptr.index(1).is_ok());
    }

    // Scenario 11: _Bool promotes and behaves exactly like a 0/1 int.
    #[test]
    fn scenario_bool_promotes_like_int() {
        let program = sample_program();
        let true_obj = program.object(Type::Boolean, None, Some(Value::Int(1))).unwrap();
        let promoted = true_obj.unary_plus().unwrap();
        assert!(promoted.ty().is_integer(promoted.catalogue()));
        assert_eq!(promoted.value_().unwrap(), Value::Int(1));

        let int_t = program.catalogue().find("int").unwrap();
        let one = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        assert!(true_obj.equals(&one));
        assert_eq!(true_obj.unary_neg().unwrap().value_().unwrap(), Value::Int(-1));
        assert_eq!(true_obj.unary_not().unwrap().value_().unwrap(), Value::Int(-2));
    }

    // Scenario 12: a const-qualified int behaves like plain int under unary +.
    #[test]
    fn scenario_qualified_int_unary_plus() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let qualified = Type::Qualified(Box::new(int_t), crate::types::Qualifiers::CONST);
        let v = program.object(qualified, None, Some(Value::Int(5))).unwrap();
        let promoted = v.unary_plus().unwrap();
        assert_eq!(promoted.value_().unwrap(), Value::Int(5));
        assert!(!matches!(promoted.ty(), Type::Qualified(..)));
    }

    // Scenario 13: attribute access matches explicit member_() for the same name.
    #[test]
    fn scenario_attr_matches_member() {
        let program = point_program();
        let point_t = program.catalogue().find("struct point").unwrap();
        let p = program.object(point_t, Some(0x1000), None).unwrap();
        assert_eq!(p.member_("x").unwrap().value_().unwrap(), p.attr_("x").unwrap().value_().unwrap());
        assert!(matches!(p.member_("z"), Err(EvalError::UnknownMember { .. })));
        assert!(matches!(p.attr_("z"), Err(EvalError::UnknownMember { .. })));
    }

    // Scenario 14: pointer vs non-pointer comparisons fail except against 0.
    #[test]
    fn scenario_pointer_vs_integer_comparison() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let ptr_t = program.catalogue().pointer(int_t.clone());
        let ptr = program.object(ptr_t, None, Some(Value::Pointer(0))).unwrap();
        let zero = program.object(int_t.clone(), None, Some(Value::Int(0))).unwrap();
        let one = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        assert!(ptr.compare(CmpOp::Eq, &zero).unwrap());
        assert!(matches!(
            ptr.compare(CmpOp::Lt, &one),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    // Scenario 15: a non-null void* never attempts a dereference when rendered.
    #[test]
    fn scenario_void_pointer_render_no_deref() {
        let program = sample_program();
        let void_t = program.catalogue().find("void").unwrap();
        let ptr_t = program.catalogue().pointer(void_t);
        let p = program.object(ptr_t, None, Some(Value::Pointer(0xffff_0000))).unwrap();
        assert_eq!(crate::render::render(&p), "(void *)0xffff0000");
    }

    // Scenario 16: cross-type equality after promotion to a common type.
    #[test]
    fn scenario_int_equals_bool_after_promotion() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let one = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        let bool_one = program.object(Type::Boolean, None, Some(Value::Int(1))).unwrap();
        assert!(one.equals(&bool_one));
    }

    // Invariant: pointer arithmetic identity, (p + i) - p == i.
    #[test]
    fn invariant_pointer_arithmetic_identity() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let ptr_t = program.catalogue().pointer(int_t.clone());
        let p = program.object(ptr_t, None, Some(Value::Pointer(0xffff_0000))).unwrap();
        let i = program.object(int_t, None, Some(Value::Int(3))).unwrap();
        let shifted = (&p + &i).unwrap();
        let diff = (&shifted - &p).unwrap();
        assert_eq!(diff.value_().unwrap(), Value::Int(3));
    }

    // Invariant: container_of inverts a member pointer back to the struct.
    #[test]
    fn invariant_container_of_inverts_member_pointer() {
        let program = point_program();
        let point_t = program.catalogue().find("struct point").unwrap();
        let p = program.object(point_t.clone(), Some(0x1000), None).unwrap();
        let y_ptr = p.member_("y").unwrap().address_of_().unwrap();
        let back = y_ptr.container_of_(&point_t, "y").unwrap();
        assert_eq!(back.pointer_target_address().unwrap(), 0x1000);
    }

    // Invariant: promotion - int combined with long yields long; same-rank
    // mixed sign yields unsigned.
    #[test]
    fn invariant_promotion_widens_to_wider_operand() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let long_t = program.catalogue().find("long").unwrap();
        let a = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        let b = program.object(long_t.clone(), None, Some(Value::Int(2))).unwrap();
        let sum = (&a + &b).unwrap();
        assert_eq!(*sum.ty(), long_t);
    }

    // Invariant: equality congruence - same program, type, and value compare
    // equal; a different value does not.
    #[test]
    fn invariant_equality_congruence() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let a = program.object(int_t.clone(), None, Some(Value::Int(42))).unwrap();
        let b = program.object(int_t.clone(), None, Some(Value::Int(42))).unwrap();
        let c = program.object(int_t, None, Some(Value::Int(43))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // Cast round-trip: narrowing then widening a value that doesn't fit
    // reproduces it modulo 2^width, re-signed.
    #[rstest]
    #[case(200i128, 8u8, false)]
    #[case(-5i128, 8u8, true)]
    #[case(70000i128, 16u8, false)]
    fn cast_round_trip_matches_modulo_width(#[case] value: i128, #[case] bits: u8, #[case] signed: bool) {
        let size = bits / 8;
        let expected = normalize_int(value, size, signed);
        let actual = normalize_int(normalize_int(value, size, signed), size, signed);
        assert_eq!(actual, expected);
    }

    // An unsigned comparison must reinterpret each operand at the *common*
    // type's own width before comparing, not at i128's full 128 bits: `(int)-1`
    // converted to `unsigned long` is `0xffffffffffffffff`, equal to that same
    // bit pattern stored directly as an `unsigned long`.
    #[test]
    fn unsigned_comparison_masks_to_common_width() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let ulong_t = program.catalogue().find("unsigned long").unwrap();
        let neg_one = program.object(int_t, None, Some(Value::Int(-1))).unwrap();
        let ulong_max = program
            .object(ulong_t, None, Some(Value::Int(-1)))
            .unwrap();
        assert!(neg_one.compare(CmpOp::Eq, &ulong_max).unwrap());
    }

    #[test]
    fn divide_by_zero_is_reported() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let a = program.object(int_t.clone(), None, Some(Value::Int(1))).unwrap();
        let zero = program.object(int_t, None, Some(Value::Int(0))).unwrap();
        assert!(matches!(a.arith(ArithOp::Div, &zero), Err(EvalError::DivideByZero)));
    }

    #[test]
    fn address_of_value_object_has_no_address() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let v = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        assert!(matches!(v.address_of_(), Err(EvalError::NoAddress)));
    }

    #[test]
    fn array_decays_for_pointer_arithmetic() {
        let program = sample_program();
        let int_t = program.catalogue().find("int").unwrap();
        let array_t = program.catalogue().array(int_t.clone(), Some(2));
        let arr = program.object(array_t, Some(0xffff_0000), None).unwrap();
        let one = program.object(int_t, None, Some(Value::Int(1))).unwrap();
        let second_ptr = (&arr + &one).unwrap();
        let second = second_ptr.index(0).unwrap();
        assert_eq!(second.value_().unwrap(), Value::Int(2));
    }
}
