//! Transformation engine interface
//!
//! The converter talks to the mapping engine through the [`Engine`] trait. Failures
//! carry an [`EngineFailureKind`] so callers can tell a missing engine binary apart
//! from every other failure without inspecting message text.

pub mod rmlmapper;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use rmlmapper::RmlMapperEngine;

/// RDF serializations the engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serialization {
    #[default]
    Turtle,
    NQuads,
    TriG,
    JsonLd,
}

impl Serialization {
    /// Name passed to the engine on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Serialization::Turtle => "turtle",
            Serialization::NQuads => "nquads",
            Serialization::TriG => "trig",
            Serialization::JsonLd => "jsonld",
        }
    }

    /// Media type of the produced document
    pub fn media_type(&self) -> &'static str {
        match self {
            Serialization::Turtle => "text/turtle",
            Serialization::NQuads => "application/n-quads",
            Serialization::TriG => "application/trig",
            Serialization::JsonLd => "application/ld+json",
        }
    }
}

/// Input for one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRequest {
    /// Logical source name (as referenced by the rules) to source content
    pub sources: BTreeMap<String, String>,
    /// Whether the engine should also emit provenance metadata
    pub generate_metadata: bool,
    pub serialization: Serialization,
}

impl MappingRequest {
    /// Request with a single named source and metadata generation disabled
    pub fn single_source(name: impl Into<String>, data: impl Into<String>) -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(name.into(), data.into());
        Self {
            sources,
            generate_metadata: false,
            serialization: Serialization::Turtle,
        }
    }
}

/// Result of a successful engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingOutput {
    /// Serialized graph; `None` when the engine produced no output document
    pub output: Option<String>,
}

/// Why an engine run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFailureKind {
    /// The engine binary is not present locally
    BinaryMissing,
    /// The engine ran and reported an error
    ExecutionFailed,
    /// Scratch files or the engine process could not be handled
    Io,
}

impl fmt::Display for EngineFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineFailureKind::BinaryMissing => "engine binary missing",
            EngineFailureKind::ExecutionFailed => "rules execution failed",
            EngineFailureKind::Io => "engine I/O failure",
        };
        f.write_str(s)
    }
}

/// Error returned by an [`Engine`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: EngineFailureKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn binary_missing(message: impl Into<String>) -> Self {
        Self::new(EngineFailureKind::BinaryMissing, message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(EngineFailureKind::ExecutionFailed, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(EngineFailureKind::Io, message)
    }

    /// Whether acquiring the engine binary could fix this failure
    pub fn is_binary_missing(&self) -> bool {
        self.kind == EngineFailureKind::BinaryMissing
    }
}

/// An external engine that applies mapping rules to sources
#[async_trait]
pub trait Engine: Send + Sync {
    /// Runs `rules` against the sources in `request`
    async fn execute(&self, rules: &str, request: &MappingRequest)
        -> Result<MappingOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_source_request_defaults() {
        let request = MappingRequest::single_source("data.json", "{}");

        assert_eq!(request.sources.get("data.json").map(String::as_str), Some("{}"));
        assert!(!request.generate_metadata);
        assert_eq!(request.serialization, Serialization::Turtle);
    }

    #[test]
    fn test_serialization_names() {
        assert_eq!(Serialization::Turtle.as_str(), "turtle");
        assert_eq!(Serialization::Turtle.media_type(), "text/turtle");
        assert_eq!(Serialization::JsonLd.media_type(), "application/ld+json");
    }

    #[test]
    fn test_engine_error_kind_helpers() {
        let missing = EngineError::binary_missing("no jar at ./rmlmapper.jar");
        assert!(missing.is_binary_missing());
        assert_eq!(
            missing.to_string(),
            "engine binary missing: no jar at ./rmlmapper.jar"
        );

        let failed = EngineError::execution_failed("Error while executing the rules.");
        assert!(!failed.is_binary_missing());
        assert_eq!(failed.kind, EngineFailureKind::ExecutionFailed);
    }
}
