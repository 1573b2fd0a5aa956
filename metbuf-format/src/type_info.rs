//! Numeric semantics of a template leaf.

/// Width, scaling and unit information attached to a leaf node.
///
/// The defaults (zero bits, no unit) describe the leaf of a query that did
/// not resolve; they merge neutrally with real descriptors when shapes are
/// aligned across subsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeInfo {
    /// Width of the packed value in bits.
    pub bits: u32,
    /// Decimal scale exponent.
    pub scale: i32,
    /// Additive reference offset.
    pub reference: i64,
    /// Unit string from the element table.
    pub unit: String,
    /// Whether the leaf carries packed character data.
    pub is_string: bool,
}

impl TypeInfo {
    /// A negative reference admits negative values once applied.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.reference < 0
    }

    /// Non-positive scales leave the value integral.
    #[inline]
    pub fn is_integer(&self) -> bool {
        self.scale <= 0
    }

    #[inline]
    pub fn is_64bit(&self) -> bool {
        self.bits > 32
    }

    /// Folds `other` into `self` when the same field is described by several
    /// subsets: the smallest reference, the widest bit width, the
    /// largest-magnitude scale and the first non-empty unit win.
    pub fn merge(&mut self, other: &TypeInfo) {
        self.reference = self.reference.min(other.reference);
        self.bits = self.bits.max(other.bits);
        if other.scale.abs() > self.scale.abs() {
            self.scale = other.scale;
        }
        if self.unit.is_empty() {
            self.unit = other.unit.clone();
        }
        self.is_string |= other.is_string;
    }
}
