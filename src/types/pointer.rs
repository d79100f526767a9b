use super::Type;

/// A pointer type: the type it points to, and the pointer's own width in
/// bytes (4 on a 32-bit target, 8 on a 64-bit one). The width is carried
/// per-type rather than looked up globally since a catalogue could, in
/// principle, describe a mixed-width ABI (near/far pointers).
#[derive(Debug, Clone, PartialEq)]
pub struct PointerType {
    pub referent: Box<Type>,
    pub width: u8,
}

impl PointerType {
    pub fn new(referent: Type, width: u8) -> Self {
        Self {
            referent: Box::new(referent),
            width,
        }
    }
}
