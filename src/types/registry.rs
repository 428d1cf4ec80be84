//! Definitions of user types, keyed by [`DefId`].
//!
//! Declaration and definition are separate steps: every name is declared
//! first, so member types may refer to any struct, enum or contract
//! (including the one being defined) by key.

use once_cell::unsync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{DataLocation, FunctionKind, FunctionType, StateMutability, Type, TypeError, TypeRef};
use crate::layout::{Declaration, Member, MemberList};
use crate::logging::{debug, trace};

/// Key of a user definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct StructDef {
    pub name: String,
    /// Name of the enclosing contract, if any.
    pub scope: Option<String>,
    members: Vec<(String, TypeRef)>,
    storage_members: OnceCell<Rc<MemberList>>,
    recursive: OnceCell<bool>,
}

impl StructDef {
    pub fn canonical_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}.{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Declared members, reference types located in storage.
    pub fn members(&self) -> &[(String, TypeRef)] {
        &self.members
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub scope: Option<String>,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn canonical_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}.{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Private,
    Internal,
    #[default]
    Public,
    External,
}

#[derive(Debug, Clone)]
pub struct StateVariable {
    pub name: String,
    pub ty: TypeRef,
    pub constant: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub returns: Vec<TypeRef>,
    pub mutability: StateMutability,
    pub visibility: Visibility,
}

impl FunctionDef {
    /// Function type as seen from inside the contract (`Internal`) or
    /// from outside (`External`, `DelegateCall` for libraries).
    pub fn function_type(&self, kind: FunctionKind) -> FunctionType {
        FunctionType::new(kind, self.params.clone(), self.returns.clone(), self.mutability)
    }

    pub fn is_externally_visible(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External)
    }
}

/// Everything needed to define a declared contract.
#[derive(Debug, Clone, Default)]
pub struct ContractSpec {
    /// Direct bases in declaration order, most base-like first.
    pub bases: Vec<DefId>,
    pub is_library: bool,
    pub payable_fallback: bool,
    pub state_variables: Vec<StateVariable>,
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug)]
pub struct ContractDef {
    pub name: String,
    pub is_library: bool,
    pub payable_fallback: bool,
    /// The contract itself first, then its bases, most derived first.
    pub linearized: Vec<DefId>,
    pub state_variables: Vec<StateVariable>,
    pub functions: Vec<FunctionDef>,
    defined: bool,
    storage_layout: OnceCell<Rc<MemberList>>,
}

#[derive(Debug)]
enum Definition {
    Struct(StructDef),
    Enum(EnumDef),
    Contract(ContractDef),
}

impl Definition {
    fn name(&self) -> &str {
        match self {
            Definition::Struct(s) => &s.name,
            Definition::Enum(e) => &e.name,
            Definition::Contract(c) => &c.name,
        }
    }
}

type MemberKey = (String, Option<DefId>);

/// Registry of user definitions for one compilation run.
///
/// Lookups that need a definition take `&TypeRegistry`; caches inside are
/// single threaded and filled only with fully computed results.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    defs: Vec<Definition>,
    names: FxHashMap<String, DefId>,
    member_cache: RefCell<FxHashMap<MemberKey, Rc<MemberList>>>,
    in_progress: RefCell<FxHashSet<DefId>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, key: String, def: Definition) -> Result<DefId, TypeError> {
        if self.names.contains_key(&key) {
            return Err(TypeError::AlreadyDeclared(key));
        }
        let id = DefId(self.defs.len() as u32);
        trace!(id = id.0, name = %key, "declared definition");
        self.defs.push(def);
        self.names.insert(key, id);
        Ok(id)
    }

    fn qualified(name: &str, scope: Option<&str>) -> String {
        match scope {
            Some(scope) => format!("{}.{}", scope, name),
            None => name.to_string(),
        }
    }

    /// Declare a struct; its members are supplied later by [`Self::define_struct`].
    pub fn declare_struct(&mut self, name: &str, scope: Option<&str>) -> Result<DefId, TypeError> {
        self.push(
            Self::qualified(name, scope),
            Definition::Struct(StructDef {
                name: name.to_string(),
                scope: scope.map(str::to_string),
                members: Vec::new(),
                storage_members: OnceCell::new(),
                recursive: OnceCell::new(),
            }),
        )
    }

    pub fn define_struct(
        &mut self,
        id: DefId,
        members: Vec<(String, TypeRef)>,
    ) -> Result<(), TypeError> {
        let def = match self.defs.get_mut(id.0 as usize) {
            Some(Definition::Struct(def)) => def,
            Some(_) => {
                return Err(TypeError::WrongDefinitionKind {
                    id: id.0,
                    expected: "struct",
                });
            }
            None => return Err(TypeError::UnknownDefinition(id.0)),
        };
        def.members = members
            .into_iter()
            .map(|(name, ty)| (name, ty.with_location_if_reference(DataLocation::Storage)))
            .collect();
        def.storage_members = OnceCell::new();
        def.recursive = OnceCell::new();
        debug!(id = id.0, name = %def.name, members = def.members.len(), "defined struct");
        Ok(())
    }

    pub fn declare_enum(
        &mut self,
        name: &str,
        scope: Option<&str>,
        values: Vec<String>,
    ) -> Result<DefId, TypeError> {
        self.push(
            Self::qualified(name, scope),
            Definition::Enum(EnumDef {
                name: name.to_string(),
                scope: scope.map(str::to_string),
                values,
            }),
        )
    }

    /// Declare a contract; bases and state are supplied by [`Self::define_contract`].
    pub fn declare_contract(&mut self, name: &str) -> Result<DefId, TypeError> {
        self.push(
            name.to_string(),
            Definition::Contract(ContractDef {
                name: name.to_string(),
                is_library: false,
                payable_fallback: false,
                linearized: vec![],
                state_variables: Vec::new(),
                functions: Vec::new(),
                defined: false,
                storage_layout: OnceCell::new(),
            }),
        )
    }

    /// Define a declared contract. Bases must already be defined.
    pub fn define_contract(&mut self, id: DefId, spec: ContractSpec) -> Result<(), TypeError> {
        let linearized = self.linearize(id, &spec.bases)?;
        let def = match self.defs.get_mut(id.0 as usize) {
            Some(Definition::Contract(def)) => def,
            Some(_) => {
                return Err(TypeError::WrongDefinitionKind {
                    id: id.0,
                    expected: "contract",
                });
            }
            None => return Err(TypeError::UnknownDefinition(id.0)),
        };
        def.is_library = spec.is_library;
        def.payable_fallback = spec.payable_fallback;
        def.linearized = linearized;
        def.state_variables = spec
            .state_variables
            .into_iter()
            .map(|v| StateVariable {
                ty: v.ty.with_location_if_reference(DataLocation::Storage),
                ..v
            })
            .collect();
        def.functions = spec.functions;
        def.defined = true;
        def.storage_layout = OnceCell::new();
        debug!(id = id.0, name = %def.name, bases = def.linearized.len(), "defined contract");
        Ok(())
    }

    /// C3 linearization: `[C] + merge(L(Bn), .., L(B1), [Bn, .., B1])`.
    fn linearize(&self, id: DefId, bases: &[DefId]) -> Result<Vec<DefId>, TypeError> {
        let name = self.name_of(id)?.to_string();
        let mut lists = Vec::with_capacity(bases.len() + 1);
        for base in bases.iter().rev() {
            let def = self.contract(*base)?;
            if !def.defined || *base == id {
                return Err(TypeError::Linearization(name));
            }
            lists.push(def.linearized.clone());
        }
        lists.push(bases.iter().rev().copied().collect::<Vec<_>>());

        let mut result = vec![id];
        loop {
            lists.retain(|l| !l.is_empty());
            if lists.is_empty() {
                break;
            }
            let next = lists
                .iter()
                .filter_map(|l| l.first().copied())
                .find(|c| lists.iter().all(|l| !l.iter().skip(1).any(|x| x == c)));
            let Some(next) = next else {
                return Err(TypeError::Linearization(name));
            };
            result.push(next);
            for list in &mut lists {
                if list.first() == Some(&next) {
                    list.remove(0);
                }
            }
        }
        Ok(result)
    }

    /// Look up a definition by (possibly qualified) name.
    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: DefId) -> Result<&str, TypeError> {
        self.defs
            .get(id.0 as usize)
            .map(Definition::name)
            .ok_or(TypeError::UnknownDefinition(id.0))
    }

    pub fn struct_def(&self, id: DefId) -> Result<&StructDef, TypeError> {
        match self.defs.get(id.0 as usize) {
            Some(Definition::Struct(def)) => Ok(def),
            Some(_) => Err(TypeError::WrongDefinitionKind {
                id: id.0,
                expected: "struct",
            }),
            None => Err(TypeError::UnknownDefinition(id.0)),
        }
    }

    pub fn enum_def(&self, id: DefId) -> Result<&EnumDef, TypeError> {
        match self.defs.get(id.0 as usize) {
            Some(Definition::Enum(def)) => Ok(def),
            Some(_) => Err(TypeError::WrongDefinitionKind {
                id: id.0,
                expected: "enum",
            }),
            None => Err(TypeError::UnknownDefinition(id.0)),
        }
    }

    pub fn contract(&self, id: DefId) -> Result<&ContractDef, TypeError> {
        match self.defs.get(id.0 as usize) {
            Some(Definition::Contract(def)) => Ok(def),
            Some(_) => Err(TypeError::WrongDefinitionKind {
                id: id.0,
                expected: "contract",
            }),
            None => Err(TypeError::UnknownDefinition(id.0)),
        }
    }

    /// Type of a named user definition: structs in `location`, enums, contracts.
    pub fn named_type(&self, name: &str, location: DataLocation) -> Option<TypeRef> {
        let id = self.lookup(name)?;
        Some(match self.defs.get(id.0 as usize)? {
            Definition::Struct(def) => Type::struct_type(id, def.name.clone(), location),
            Definition::Enum(def) => Type::enum_type(id, def.name.clone()),
            Definition::Contract(def) => Type::contract(id, def.name.clone()),
        })
    }

    /// Run `f` with `id` marked as being computed; a nested request for the
    /// same struct reports [`TypeError::RecursiveStruct`].
    pub(crate) fn guarded<T>(
        &self,
        id: DefId,
        f: impl FnOnce() -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        if !self.in_progress.borrow_mut().insert(id) {
            let name = self.name_of(id)?.to_string();
            return Err(TypeError::RecursiveStruct(name));
        }
        let result = f();
        self.in_progress.borrow_mut().remove(&id);
        result
    }

    /// All members of a struct with their storage types, in declaration order.
    pub fn struct_storage_members(&self, id: DefId) -> Result<Rc<MemberList>, TypeError> {
        let def = self.struct_def(id)?;
        let list = def.storage_members.get_or_init(|| {
            Rc::new(MemberList::new(
                def.members
                    .iter()
                    .enumerate()
                    .map(|(index, (name, ty))| {
                        Member::declared(name, ty.clone(), Declaration { owner: id, index })
                    })
                    .collect(),
            ))
        });
        Ok(Rc::clone(list))
    }

    /// A struct reaches itself through its members (looking through arrays).
    pub fn is_recursive(&self, id: DefId) -> Result<bool, TypeError> {
        let def = self.struct_def(id)?;
        if let Some(recursive) = def.recursive.get() {
            return Ok(*recursive);
        }
        let mut seen = FxHashSet::default();
        let recursive = self.reaches(id, id, &mut seen)?;
        let _ = def.recursive.set(recursive);
        Ok(recursive)
    }

    fn reaches(
        &self,
        from: DefId,
        target: DefId,
        seen: &mut FxHashSet<DefId>,
    ) -> Result<bool, TypeError> {
        if !seen.insert(from) {
            return Ok(false);
        }
        for (_, ty) in &self.struct_def(from)?.members {
            let mut inner = ty.as_ref();
            while let Type::Array(a) = inner {
                inner = a.base.as_ref();
            }
            if let Type::Struct(s) = inner {
                if s.id == target || self.reaches(s.id, target, seen)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Non-constant state variables of a contract and its bases, most base-like first.
    pub fn state_variables(&self, id: DefId) -> Result<Rc<MemberList>, TypeError> {
        let def = self.contract(id)?;
        if let Some(list) = def.storage_layout.get() {
            return Ok(Rc::clone(list));
        }
        let mut members = Vec::new();
        for base in def.linearized.iter().rev() {
            let base_def = self.contract(*base)?;
            for (index, var) in base_def.state_variables.iter().enumerate() {
                if var.constant {
                    continue;
                }
                members.push(Member::declared(
                    &var.name,
                    var.ty.clone(),
                    Declaration {
                        owner: *base,
                        index,
                    },
                ));
            }
        }
        let list = def
            .storage_layout
            .get_or_init(|| Rc::new(MemberList::new(members)));
        Ok(Rc::clone(list))
    }

    pub(crate) fn cached_members(&self, key: &MemberKey) -> Option<Rc<MemberList>> {
        self.member_cache.borrow().get(key).cloned()
    }

    pub(crate) fn cache_members(&self, key: MemberKey, list: Rc<MemberList>) -> Rc<MemberList> {
        Rc::clone(self.member_cache.borrow_mut().entry(key).or_insert(list))
    }

    /// Number of definitions, of any kind.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(reg: &mut TypeRegistry, name: &str, bases: Vec<DefId>) -> DefId {
        let id = reg.declare_contract(name).unwrap();
        reg.define_contract(
            id,
            ContractSpec {
                bases,
                ..ContractSpec::default()
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn linearizes_diamond() {
        let mut reg = TypeRegistry::new();
        let a = contract(&mut reg, "A", vec![]);
        let b = contract(&mut reg, "B", vec![a]);
        let c = contract(&mut reg, "C", vec![a]);
        let d = contract(&mut reg, "D", vec![b, c]);
        assert_eq!(reg.contract(d).unwrap().linearized, vec![d, c, b, a]);
    }

    #[test]
    fn rejects_inconsistent_order() {
        let mut reg = TypeRegistry::new();
        let a = contract(&mut reg, "A", vec![]);
        let b = contract(&mut reg, "B", vec![a]);
        let c = reg.declare_contract("C").unwrap();
        let err = reg.define_contract(
            c,
            ContractSpec {
                bases: vec![b, a],
                ..ContractSpec::default()
            },
        );
        assert!(matches!(err, Err(TypeError::Linearization(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = TypeRegistry::new();
        reg.declare_struct("S", None).unwrap();
        assert_eq!(
            reg.declare_struct("S", None),
            Err(TypeError::AlreadyDeclared("S".into()))
        );
        assert!(reg.declare_struct("S", Some("C")).is_ok());
    }

    #[test]
    fn detects_recursion_through_arrays() {
        let mut reg = TypeRegistry::new();
        let s = reg.declare_struct("Node", None).unwrap();
        let children = Type::array(
            DataLocation::Storage,
            Type::struct_type(s, "Node", DataLocation::Storage),
            None,
        );
        reg.define_struct(s, vec![("value".into(), Type::uint256()), ("children".into(), children)])
            .unwrap();
        assert!(reg.is_recursive(s).unwrap());
    }
}
