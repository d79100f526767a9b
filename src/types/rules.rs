//! C11 S6.3 conversions: integer promotion, the usual arithmetic
//! conversions, and pointer decay.

use crate::types::catalogue::TypeCatalogue;
use crate::types::{rank, ArrayType, IntegerType, PointerType, Type};

pub struct TypeRules;

impl TypeRules {
    /// Promotes any integer type of rank less than `int` to `int` (or
    /// `unsigned int` if `int` cannot represent its full range).
    /// Floating types and types already at or above `int`'s rank pass
    /// through unchanged (after stripping qualifiers/typedefs).
    pub fn integer_promote(catalogue: &TypeCatalogue, ty: &Type) -> Type {
        let stripped = ty.strip(catalogue);
        match &stripped {
            Type::Boolean => catalogue.find("int").expect("builtin int"),
            Type::Enum(id) => {
                let underlying = catalogue.enum_def(*id).underlying.clone();
                Self::integer_promote(catalogue, &Type::Integer(underlying))
            }
            Type::Integer(i) if i.rank < rank::INT => {
                let int_ty = catalogue.find("int").expect("builtin int");
                let Type::Integer(int_i) = &int_ty else {
                    unreachable!()
                };
                if i.size < int_i.size || (i.size == int_i.size && i.signed) {
                    int_ty
                } else {
                    catalogue.find("unsigned int").expect("builtin unsigned int")
                }
            }
            _ => stripped,
        }
    }

    /// Promotes an integer operand as [`Self::integer_promote`] does, but
    /// passes a floating operand through unchanged (just stripped) - the
    /// promotion unary `+`/`-`/`~` apply to their single operand, where
    /// there is no second operand to converge with.
    pub fn integer_promote_or_float(catalogue: &TypeCatalogue, ty: &Type) -> Type {
        let stripped = ty.strip(catalogue);
        if matches!(stripped, Type::Floating(_)) {
            stripped
        } else {
            Self::integer_promote(catalogue, ty)
        }
    }

    /// An array operand decays to a pointer to its element type; anything
    /// else passes through unchanged.
    pub fn decay(catalogue: &TypeCatalogue, ty: &Type) -> Type {
        match ty.strip(catalogue) {
            Type::Array(ArrayType { element, .. }) => catalogue.pointer(*element),
            other => other,
        }
    }

    /// The usual arithmetic conversions for two *arithmetic* operands
    /// (integer or floating; pointers are handled separately by the
    /// object-level arithmetic dispatch). Both operands are promoted,
    /// then converged to a single common type per C11 S6.3.1.8.
    pub fn usual_arithmetic_conversions(catalogue: &TypeCatalogue, a: &Type, b: &Type) -> Type {
        let pa = if a.is_floating(catalogue) {
            a.strip(catalogue)
        } else {
            Self::integer_promote(catalogue, a)
        };
        let pb = if b.is_floating(catalogue) {
            b.strip(catalogue)
        } else {
            Self::integer_promote(catalogue, b)
        };
        match (&pa, &pb) {
            (Type::Floating(fa), Type::Floating(fb)) => {
                if fa.size >= fb.size {
                    pa
                } else {
                    pb
                }
            }
            (Type::Floating(_), _) => pa,
            (_, Type::Floating(_)) => pb,
            (Type::Integer(ia), Type::Integer(ib)) => {
                Self::usual_arithmetic_integers(catalogue, ia, ib)
            }
            _ => pa,
        }
    }

    fn usual_arithmetic_integers(
        catalogue: &TypeCatalogue,
        ia: &IntegerType,
        ib: &IntegerType,
    ) -> Type {
        if ia.rank == ib.rank && ia.signed == ib.signed {
            return Type::Integer(ia.clone());
        }
        if ia.signed == ib.signed {
            return Type::Integer(if ia.rank >= ib.rank {
                ia.clone()
            } else {
                ib.clone()
            });
        }
        let (signed, unsigned) = if ia.signed { (ia, ib) } else { (ib, ia) };
        if unsigned.rank >= signed.rank {
            Type::Integer(unsigned.clone())
        } else if signed.size > unsigned.size {
            Type::Integer(signed.clone())
        } else {
            let name = format!("unsigned {}", signed.name);
            catalogue.find(&name).unwrap_or(Type::Integer(IntegerType {
                name,
                size: signed.size,
                signed: false,
                rank: signed.rank,
            }))
        }
    }

    /// `pointer(T)` whose referent/width are identical once both sides are
    /// stripped of qualifiers - the notion of "compatible referent" used
    /// by pointer arithmetic and relational comparisons.
    pub fn pointers_compatible(catalogue: &TypeCatalogue, a: &PointerType, b: &PointerType) -> bool {
        a.width == b.width && a.referent.strip(catalogue) == b.referent.strip(catalogue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_promotes_to_int() {
        let catalogue = TypeCatalogue::new(8);
        let short = catalogue.find("short").unwrap();
        let promoted = TypeRules::integer_promote(&catalogue, &short);
        assert_eq!(promoted, catalogue.find("int").unwrap());
    }

    #[test]
    fn bool_promotes_to_int() {
        let catalogue = TypeCatalogue::new(8);
        let promoted = TypeRules::integer_promote(&catalogue, &Type::Boolean);
        assert_eq!(promoted, catalogue.find("int").unwrap());
    }

    #[test]
    fn int_long_conversion_is_long() {
        let catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        let long_t = catalogue.find("long").unwrap();
        let common = TypeRules::usual_arithmetic_conversions(&catalogue, &int_t, &long_t);
        assert_eq!(common, long_t);
    }

    #[test]
    fn same_rank_mixed_sign_is_unsigned() {
        let catalogue = TypeCatalogue::new(8);
        let int_t = catalogue.find("int").unwrap();
        let uint_t = catalogue.find("unsigned int").unwrap();
        let common = TypeRules::usual_arithmetic_conversions(&catalogue, &int_t, &uint_t);
        assert_eq!(common, uint_t);
    }

    #[test]
    fn array_decays_to_pointer() {
        let catalogue = TypeCatalogue::new(8);
        let char_t = catalogue.find("char").unwrap();
        let array = catalogue.array(char_t.clone(), Some(4));
        let decayed = TypeRules::decay(&catalogue, &array);
        assert_eq!(decayed, catalogue.pointer(char_t));
    }
}
