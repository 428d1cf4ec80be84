//! Ordered member lists and the storage slot packing computed from them.
//!
//! A [`MemberList`] holds struct fields or contract state variables in
//! declaration order. Its [`StorageOffsets`] are computed on first request
//! and kept for the lifetime of the list.

mod report;

pub use report::{StorageEntry, StorageLayout, StorageTypeInfo};

use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::unsync::OnceCell;
use std::fmt;

use crate::logging::trace;
use crate::types::{DefId, TypeError, TypeRef, TypeRegistry};

/// Back-link from a member to the definition that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Declaration {
    /// Struct, enum or contract owning the declaration.
    pub owner: DefId,
    /// Position within the owner's declarations.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: TypeRef,
    pub declaration: Option<Declaration>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            declaration: None,
        }
    }

    pub fn declared(name: impl Into<String>, ty: TypeRef, declaration: Declaration) -> Self {
        Self {
            name: name.into(),
            ty,
            declaration: Some(declaration),
        }
    }
}

/// Position of a value in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageSlot {
    pub slot: BigUint,
    /// Byte offset inside the slot, counted from the least significant end.
    pub offset: u8,
}

impl fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} offset {}", self.slot, self.offset)
    }
}

/// Slot and byte offset per member index, plus the total number of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOffsets {
    offsets: Vec<Option<StorageSlot>>,
    storage_size: BigUint,
}

impl StorageOffsets {
    /// Greedy packing: single-slot values share a slot while they fit,
    /// everything larger starts on a fresh slot and ends its last one.
    /// Types that cannot be stored get no position.
    pub fn compute<'a>(
        reg: &TypeRegistry,
        types: impl IntoIterator<Item = &'a TypeRef>,
    ) -> Result<Self, TypeError> {
        let limit = BigUint::one() << 256u32;
        let mut slot = BigUint::zero();
        let mut byte_offset = 0usize;
        let mut offsets = Vec::new();
        for ty in types {
            if !ty.can_be_stored() {
                offsets.push(None);
                continue;
            }
            let bytes = ty.storage_bytes(reg)?;
            if byte_offset + bytes > 32 {
                slot += 1u8;
                byte_offset = 0;
            }
            if slot >= limit {
                return Err(TypeError::StorageOverflow);
            }
            offsets.push(Some(StorageSlot {
                slot: slot.clone(),
                offset: byte_offset as u8,
            }));
            let size = ty.storage_size(reg)?;
            if size.is_one() && byte_offset + bytes <= 32 {
                byte_offset += bytes;
            } else {
                slot += size;
                byte_offset = 0;
            }
        }
        if byte_offset > 0 {
            slot += 1u8;
        }
        if slot >= limit {
            return Err(TypeError::StorageOverflow);
        }
        trace!(members = offsets.len(), slots = %slot, "computed storage offsets");
        Ok(Self {
            offsets,
            storage_size: slot,
        })
    }

    pub fn offset(&self, index: usize) -> Option<&StorageSlot> {
        self.offsets.get(index).and_then(Option::as_ref)
    }

    pub fn storage_size(&self) -> &BigUint {
        &self.storage_size
    }
}

/// Ordered `(name, type, declaration)` members.
#[derive(Debug, Default)]
pub struct MemberList {
    members: Vec<Member>,
    offsets: OnceCell<StorageOffsets>,
}

impl PartialEq for MemberList {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl MemberList {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members,
            offsets: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Member> {
        self.members.iter()
    }

    /// First member with the given name.
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// All members with the given name (function overloads).
    pub fn overloads<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Member> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }

    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Offsets of all members; computed once, a failed computation is not kept.
    pub fn storage_offsets(&self, reg: &TypeRegistry) -> Result<&StorageOffsets, TypeError> {
        self.offsets
            .get_or_try_init(|| StorageOffsets::compute(reg, self.members.iter().map(|m| &m.ty)))
    }

    /// Slot and offset of the member at `index`, `None` for members that are not stored.
    pub fn offset(&self, reg: &TypeRegistry, index: usize) -> Result<Option<&StorageSlot>, TypeError> {
        Ok(self.storage_offsets(reg)?.offset(index))
    }

    /// Slot and offset of the first member called `name`.
    pub fn member_storage_offset(
        &self,
        reg: &TypeRegistry,
        name: &str,
    ) -> Result<Option<&StorageSlot>, TypeError> {
        let Some(index) = self.members.iter().position(|m| m.name == name) else {
            return Ok(None);
        };
        self.offset(reg, index)
    }

    pub fn storage_size(&self, reg: &TypeRegistry) -> Result<BigUint, TypeError> {
        Ok(self.storage_offsets(reg)?.storage_size().clone())
    }
}

impl<'a> IntoIterator for &'a MemberList {
    type Item = &'a Member;
    type IntoIter = std::slice::Iter<'a, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataLocation, Type};

    fn slot(slot: u32, offset: u8) -> Option<StorageSlot> {
        Some(StorageSlot {
            slot: slot.into(),
            offset,
        })
    }

    #[test]
    fn packs_small_values() {
        let reg = TypeRegistry::new();
        let types = [Type::uint(128), Type::uint(128), Type::uint256()];
        let offsets = StorageOffsets::compute(&reg, &types).unwrap();
        assert_eq!(offsets.offset(0).cloned(), slot(0, 0));
        assert_eq!(offsets.offset(1).cloned(), slot(0, 16));
        assert_eq!(offsets.offset(2).cloned(), slot(1, 0));
        assert_eq!(offsets.storage_size(), &BigUint::from(2u8));
    }

    #[test]
    fn multi_slot_members_start_fresh() {
        let reg = TypeRegistry::new();
        let types = [
            Type::boolean(),
            Type::array(DataLocation::Storage, Type::uint256(), Some(3u8.into())),
            Type::address(),
        ];
        let offsets = StorageOffsets::compute(&reg, &types).unwrap();
        assert_eq!(offsets.offset(1).cloned(), slot(1, 0));
        assert_eq!(offsets.offset(2).cloned(), slot(4, 0));
        assert_eq!(offsets.storage_size(), &BigUint::from(5u8));
    }

    #[test]
    fn mappings_take_a_slot_and_constants_are_skipped() {
        let reg = TypeRegistry::new();
        let types = [
            Type::uint(8),
            Type::mapping(Type::address(), Type::uint256()),
            Type::constant(1),
            Type::uint(8),
        ];
        let offsets = StorageOffsets::compute(&reg, &types).unwrap();
        assert_eq!(offsets.offset(1).cloned(), slot(1, 0));
        assert_eq!(offsets.offset(2), None);
        assert_eq!(offsets.offset(3).cloned(), slot(2, 0));
    }

    #[test]
    fn offsets_are_computed_once() {
        let reg = TypeRegistry::new();
        let list = MemberList::new(vec![
            Member::new("a", Type::uint(64)),
            Member::new("b", Type::fixed_bytes(8)),
        ]);
        let first = list.storage_offsets(&reg).unwrap() as *const StorageOffsets;
        let second = list.storage_offsets(&reg).unwrap() as *const StorageOffsets;
        assert_eq!(first, second);
        assert_eq!(
            list.member_storage_offset(&reg, "b").unwrap().cloned(),
            slot(0, 8)
        );
        assert_eq!(list.member_storage_offset(&reg, "c").unwrap(), None);
    }

    #[test]
    fn overflow_is_reported() {
        let reg = TypeRegistry::new();
        let huge = Type::array(
            DataLocation::Storage,
            Type::uint256(),
            Some((BigUint::one() << 255u32) + 1u8),
        );
        let err = StorageOffsets::compute(&reg, &[huge.clone(), huge]);
        assert_eq!(err, Err(TypeError::StorageOverflow));
    }
}
