//! # Keel Service Value Type Errors
//!
//! Error types raised while constructing or parsing the service value types:
//! [`ServiceNameError`] for malformed service names and [`ServiceStateError`]
//! for unknown state names or out-of-range state indices.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceNameError {
    #[error("Service name domain must not be empty")]
    EmptyDomain,

    #[error("Invalid character '{character}' in service name {component} '{value}'")]
    InvalidCharacter {
        component: &'static str,
        value: String,
        character: char,
    },

    #[error("Malformed property '{property}' in service name '{input}': expected key=value")]
    MalformedProperty { input: String, property: String },

    #[error("Duplicate property key '{key}' in service name '{input}'")]
    DuplicateKey { input: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceStateError {
    #[error("Unknown service state name '{0}'")]
    UnknownName(String),

    #[error("Service state index {0} is out of range (expected 0-3)")]
    InvalidIndex(u32),
}
