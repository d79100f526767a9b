use super::IntegerType;

/// A C enum: its underlying storage type and the ordered set of named
/// constants. Constant values are stored as the underlying type would
/// represent them (already wrapped modulo its width).
pub struct EnumDef {
    pub name: Option<String>,
    pub underlying: IntegerType,
    pub constants: Vec<(String, i128)>,
}

impl EnumDef {
    pub fn new(
        name: Option<String>,
        underlying: IntegerType,
        constants: Vec<(String, i128)>,
    ) -> Self {
        Self {
            name,
            underlying,
            constants,
        }
    }

    pub fn constant_value(&self, name: &str) -> Option<i128> {
        self.constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn name_of_value(&self, value: i128) -> Option<&str> {
        self.constants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}
