//! anyrdf library
//!
//! Converts structured input to RDF Turtle through RML mapping rules. Results are
//! cached by input fingerprint, and the RMLMapper engine is downloaded on demand
//! the first time it turns out to be missing.

pub mod cache;
pub mod cli;
pub mod config;
pub mod converter;
pub mod dependency;
pub mod engine;

pub use config::{CacheConfig, ConverterConfig, EngineConfig, Retention};
pub use converter::{ConversionRequest, ConvertError, ConvertedOutput, Converter};
