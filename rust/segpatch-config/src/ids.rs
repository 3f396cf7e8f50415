/// Identifier of an attribute within an [`AttributeSchema`](crate::AttributeSchema).
///
/// Ids are dense, assigned in declaration order, and cover pack members as well
/// as plain attributes, so they can index per-attribute side tables directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrId(u32);

impl AttrId {
    pub const INVALID_ID: u32 = u32::MAX;

    pub const fn new(id: u32) -> AttrId {
        AttrId(id)
    }

    pub const fn invalid() -> AttrId {
        AttrId(Self::INVALID_ID)
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != Self::INVALID_ID
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for AttrId {
    fn from(value: u32) -> Self {
        AttrId(value)
    }
}

impl From<usize> for AttrId {
    fn from(value: usize) -> Self {
        assert!(u32::try_from(value).is_ok());
        AttrId(value as u32)
    }
}

impl std::fmt::Display for AttrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a pack attribute, dense in pack declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackAttrId(u32);

impl PackAttrId {
    pub const INVALID_ID: u32 = u32::MAX;

    pub const fn new(id: u32) -> PackAttrId {
        PackAttrId(id)
    }

    pub const fn invalid() -> PackAttrId {
        PackAttrId(Self::INVALID_ID)
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != Self::INVALID_ID
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for PackAttrId {
    fn from(value: usize) -> Self {
        assert!(u32::try_from(value).is_ok());
        PackAttrId(value as u32)
    }
}

impl std::fmt::Display for PackAttrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
