//! Error types for structural type queries.

use thiserror::Error;

/// Hard failures of type queries.
///
/// Type incompatibility is not an error: conversion and operator queries
/// return `bool` or `Option`. These variants cover structural limits and
/// broken definitions, where no sensible partial result exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Object too large for storage")]
    StorageOverflow,

    #[error("Array too large for storage")]
    ArrayTooLarge,

    #[error("Type {0} cannot be stored")]
    NotStorable(String),

    #[error("Type {0} has no calldata encoding")]
    NotEncodable(String),

    #[error("Type {0} is dynamically encoded and has no static size")]
    DynamicallyEncoded(String),

    #[error("Recursive struct {0} has no finite layout")]
    RecursiveStruct(String),

    #[error("No interface type: {0}")]
    NoInterfaceType(String),

    #[error("Unknown definition #{0}")]
    UnknownDefinition(u32),

    #[error("Definition #{id} is not a {expected}")]
    WrongDefinitionKind { id: u32, expected: &'static str },

    #[error("Identifier '{0}' is already declared")]
    AlreadyDeclared(String),

    #[error("Linearization of inheritance graph impossible for {0}")]
    Linearization(String),
}
