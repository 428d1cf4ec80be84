//! Definitions file parsing.
//!
//! A definitions file stands in for the resolver: it lists the structs,
//! enums and contracts of one compilation run, with member types written
//! as type names (`uint128`, `mapping(address => Point)`, `bytes[]`).
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [[struct]]
//! name = "Point"
//! members = [{ name = "x", type = "uint128" }, { name = "y", type = "uint128" }]
//!
//! [[enum]]
//! name = "Color"
//! values = ["Red", "Green", "Blue"]
//!
//! [[contract]]
//! name = "Shapes"
//! variables = [{ name = "origin", type = "Point" }, { name = "fill", type = "Color" }]
//! functions = [{ name = "move", params = ["int256", "int256"], returns = ["bool"] }]
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::logging::debug;
use crate::types::{
    ContractSpec, DataLocation, DefId, FunctionDef, ParseTypeError, StateMutability,
    StateVariable, TypeError, TypeParser, TypeRef, TypeRegistry, Visibility,
};

/// Contents of a definitions file.
#[derive(Debug, Default, Deserialize)]
pub struct Definitions {
    /// Logging settings for the command-line front end.
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "struct")]
    pub structs: Vec<StructConfig>,
    #[serde(default, rename = "enum")]
    pub enums: Vec<EnumConfig>,
    #[serde(default, rename = "contract")]
    pub contracts: Vec<ContractConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructConfig {
    pub name: String,
    /// Enclosing contract; the struct is then known as `Scope.Name`.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumConfig {
    pub name: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub name: String,
    #[serde(default)]
    pub library: bool,
    #[serde(default)]
    pub payable_fallback: bool,
    /// Direct bases, most base-like first.
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub constant: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub returns: Vec<String>,
    #[serde(default = "default_mutability")]
    pub mutability: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

fn default_mutability() -> String {
    "nonpayable".to_string()
}

fn default_visibility() -> String {
    "public".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `solty=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// `stdout`, `stderr` or a file path.
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub target: bool,
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            output: default_output(),
            timestamps: false,
            target: false,
            color: default_color(),
        }
    }
}

impl Definitions {
    /// Load definitions from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_str(&content)
    }

    /// Parse definitions from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Build a registry holding every definition.
    ///
    /// All names are declared before any member type is parsed, so structs
    /// may refer to each other (and to themselves) in any order. Contracts
    /// are defined once all of their bases are.
    pub fn build_registry(&self) -> Result<TypeRegistry, ConfigError> {
        let mut reg = TypeRegistry::new();
        let mut struct_ids = Vec::with_capacity(self.structs.len());
        for def in &self.structs {
            struct_ids.push(reg.declare_struct(&def.name, def.scope.as_deref())?);
        }
        for def in &self.enums {
            reg.declare_enum(&def.name, def.scope.as_deref(), def.values.clone())?;
        }
        let mut contract_ids = Vec::with_capacity(self.contracts.len());
        for def in &self.contracts {
            contract_ids.push(reg.declare_contract(&def.name)?);
        }

        let mut struct_members = Vec::with_capacity(self.structs.len());
        {
            let parser = TypeParser::new(&reg).with_default_location(DataLocation::Storage);
            for def in &self.structs {
                let members = def
                    .members
                    .iter()
                    .map(|m| Ok((m.name.clone(), parse(&parser, &m.ty)?)))
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                struct_members.push(members);
            }
        }
        for (id, members) in struct_ids.into_iter().zip(struct_members) {
            reg.define_struct(id, members)?;
        }

        let mut specs = Vec::with_capacity(self.contracts.len());
        for def in &self.contracts {
            specs.push(self.contract_spec(&reg, def)?);
        }
        let mut pending: Vec<(DefId, ContractSpec)> = contract_ids.into_iter().zip(specs).collect();
        let mut defined: Vec<DefId> = Vec::new();
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|(_, spec)| spec.bases.iter().all(|b| defined.contains(b)));
            let Some(index) = ready else {
                let names = pending
                    .iter()
                    .map(|(id, _)| reg.name_of(*id).map(str::to_string))
                    .collect::<Result<Vec<_>, TypeError>>()?;
                return Err(ConfigError::CyclicInheritance(names.join(", ")));
            };
            let (id, spec) = pending.remove(index);
            reg.define_contract(id, spec)?;
            defined.push(id);
        }
        debug!(definitions = reg.len(), "built registry from definitions");
        Ok(reg)
    }

    fn contract_spec(&self, reg: &TypeRegistry, def: &ContractConfig) -> Result<ContractSpec, ConfigError> {
        let bases = def
            .bases
            .iter()
            .map(|name| match reg.lookup(name) {
                Some(id) if self.contracts.iter().any(|c| &c.name == name) => Ok(id),
                _ => Err(ConfigError::UnknownBase {
                    contract: def.name.clone(),
                    base: name.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let storage = TypeParser::new(reg).with_default_location(DataLocation::Storage);
        let state_variables = def
            .variables
            .iter()
            .map(|v| {
                Ok(StateVariable {
                    name: v.name.clone(),
                    ty: parse(&storage, &v.ty)?,
                    constant: v.constant,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let memory = TypeParser::new(reg);
        let mut functions = Vec::with_capacity(def.functions.len());
        for f in &def.functions {
            let mutability = StateMutability::from_keyword(&f.mutability)
                .ok_or_else(|| ConfigError::Keyword("state mutability", f.mutability.clone()))?;
            let visibility = visibility_keyword(&f.visibility)
                .ok_or_else(|| ConfigError::Keyword("visibility", f.visibility.clone()))?;
            functions.push(FunctionDef {
                name: f.name.clone(),
                params: parse_all(&memory, &f.params)?,
                returns: parse_all(&memory, &f.returns)?,
                mutability,
                visibility,
            });
        }

        Ok(ContractSpec {
            bases,
            is_library: def.library,
            payable_fallback: def.payable_fallback,
            state_variables,
            functions,
        })
    }
}

fn parse(parser: &TypeParser<'_>, name: &str) -> Result<TypeRef, ConfigError> {
    parser
        .parse(name)
        .map_err(|e| ConfigError::TypeName(name.to_string(), e))
}

fn parse_all(parser: &TypeParser<'_>, names: &[String]) -> Result<Vec<TypeRef>, ConfigError> {
    names.iter().map(|n| parse(parser, n)).collect()
}

fn visibility_keyword(word: &str) -> Option<Visibility> {
    match word {
        "private" => Some(Visibility::Private),
        "internal" => Some(Visibility::Internal),
        "public" => Some(Visibility::Public),
        "external" => Some(Visibility::External),
        _ => None,
    }
}

/// Definitions file error.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading the definitions file.
    Io(String, std::io::Error),
    /// TOML parse error.
    Parse(toml::de::Error),
    /// A member, variable or parameter type name did not parse.
    TypeName(String, ParseTypeError),
    /// The registry rejected a definition.
    Type(TypeError),
    UnknownBase { contract: String, base: String },
    CyclicInheritance(String),
    /// Unknown keyword for the named setting.
    Keyword(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Failed to read definitions file '{}': {}", path, e),
            ConfigError::Parse(e) => write!(f, "Failed to parse definitions: {}", e),
            ConfigError::TypeName(name, e) => write!(f, "Invalid type name '{}': {}", name, e),
            ConfigError::Type(e) => write!(f, "Invalid definition: {}", e),
            ConfigError::UnknownBase { contract, base } => {
                write!(f, "Contract '{}' inherits from unknown contract '{}'", contract, base)
            }
            ConfigError::CyclicInheritance(names) => {
                write!(f, "Cyclic inheritance between contracts: {}", names)
            }
            ConfigError::Keyword(what, word) => write!(f, "Unknown {} '{}'", what, word),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::TypeName(_, e) => Some(e),
            ConfigError::Type(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TypeError> for ConfigError {
    fn from(e: TypeError) -> Self {
        ConfigError::Type(e)
    }
}
