//! Storage layout report for a contract: one entry per state variable
//! plus a description of every type that appears in it.

use std::collections::BTreeMap;

#[cfg(feature = "json")]
use serde::Serialize;

use crate::types::{DefId, Type, TypeError, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct StorageEntry {
    pub label: String,
    /// Contract that declared the variable.
    pub contract: String,
    /// Slot number in decimal.
    pub slot: String,
    pub offset: u8,
    /// Type identifier, key into [`StorageLayout::types`].
    #[cfg_attr(feature = "json", serde(rename = "type"))]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub struct StorageTypeInfo {
    /// `inplace`, `mapping`, `dynamic_array` or `bytes`.
    pub encoding: &'static str,
    pub label: String,
    /// Bytes occupied in storage, in decimal.
    pub number_of_bytes: String,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub base: Option<String>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub key: Option<String>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<String>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub members: Option<Vec<StorageEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct StorageLayout {
    pub storage: Vec<StorageEntry>,
    pub types: BTreeMap<String, StorageTypeInfo>,
}

impl StorageLayout {
    /// Layout of the state variables of `contract`, bases first.
    pub fn for_contract(reg: &TypeRegistry, contract: DefId) -> Result<Self, TypeError> {
        let variables = reg.state_variables(contract)?;
        let offsets = variables.storage_offsets(reg)?;
        let mut layout = StorageLayout::default();
        for (index, member) in variables.iter().enumerate() {
            let Some(position) = offsets.offset(index) else {
                continue;
            };
            let owner = match member.declaration {
                Some(declaration) => reg.name_of(declaration.owner)?.to_string(),
                None => reg.name_of(contract)?.to_string(),
            };
            layout.storage.push(StorageEntry {
                label: member.name.clone(),
                contract: owner,
                slot: position.slot.to_string(),
                offset: position.offset,
                ty: member.ty.identifier(),
            });
            layout.describe(reg, &member.ty)?;
        }
        Ok(layout)
    }

    fn describe(&mut self, reg: &TypeRegistry, ty: &Type) -> Result<(), TypeError> {
        let id = ty.identifier();
        if self.types.contains_key(&id) {
            return Ok(());
        }
        let label = ty.canonical_name(reg)?;
        let number_of_bytes = if ty.is_single_slot(reg)? && ty.is_value_type() {
            ty.storage_bytes(reg)?.to_string()
        } else {
            (ty.storage_size(reg)? * 32u8).to_string()
        };
        let mut info = StorageTypeInfo {
            encoding: "inplace",
            label,
            number_of_bytes,
            base: None,
            key: None,
            value: None,
            members: None,
        };
        match ty {
            Type::Array(a) if a.is_byte_array() => info.encoding = "bytes",
            Type::Array(a) => {
                if a.is_dynamically_sized() {
                    info.encoding = "dynamic_array";
                }
                info.base = Some(a.base.identifier());
                self.types.insert(id, info);
                return self.describe(reg, &a.base);
            }
            Type::Mapping { key, value } => {
                info.encoding = "mapping";
                info.key = Some(key.identifier());
                info.value = Some(value.identifier());
                self.types.insert(id, info);
                self.describe(reg, key)?;
                return self.describe(reg, value);
            }
            Type::Struct(s) => {
                let members = reg.struct_storage_members(s.id)?;
                let offsets = members.storage_offsets(reg)?;
                let mut entries = Vec::new();
                for (index, member) in members.iter().enumerate() {
                    let Some(position) = offsets.offset(index) else {
                        continue;
                    };
                    entries.push(StorageEntry {
                        label: member.name.clone(),
                        contract: reg.name_of(s.id)?.to_string(),
                        slot: position.slot.to_string(),
                        offset: position.offset,
                        ty: member.ty.identifier(),
                    });
                }
                info.members = Some(entries);
                self.types.insert(id, info);
                for member in members.iter() {
                    self.describe(reg, &member.ty)?;
                }
                return Ok(());
            }
            _ => {}
        }
        self.types.insert(id, info);
        Ok(())
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
