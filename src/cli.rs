//! Command-line interface parsing for anyrdf
//!
//! This module handles parsing of CLI arguments using clap and turns them into a
//! [`ConverterConfig`] plus the list of inputs to convert.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{
    default_jar_path, parse_duration, parse_retention, CacheConfig, ConfigError, ConverterConfig,
    EngineConfig,
};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A duration flag could not be parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No content type was given and none could be inferred from the file name
    #[error("Cannot infer content type of '{0}'. Pass --content-type (e.g. application/json)")]
    UnknownInputType(PathBuf),
}

/// anyrdf - Convert JSON, CSV and XML to RDF with RML mappings
#[derive(Parser, Debug)]
#[command(name = "anyrdf")]
#[command(about = "Convert structured data to RDF Turtle with RML mapping rules")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert one or more input files and print the Turtle to stdout
    Convert(ConvertArgs),
    /// Download the latest RMLMapper release to the engine path
    FetchEngine(EngineArgs),
}

/// Options for locating and running the engine
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Path of the RMLMapper jar (downloaded there when missing)
    #[arg(long, value_name = "JAR")]
    pub engine: Option<PathBuf>,

    /// Java executable used to run the jar
    #[arg(long, value_name = "BIN", default_value = "java")]
    pub java: PathBuf,
}

impl EngineArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            jar_path: self.engine.clone().unwrap_or_else(default_jar_path),
            java_bin: self.java.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// RML mapping rules
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// Media type of the inputs; inferred from the file extension when omitted
    #[arg(long, value_name = "MIME")]
    pub content_type: Option<String>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Cache results so identical inputs are converted only once
    #[arg(long)]
    pub cache: bool,

    /// How long unused results stay cached (e.g. 15m, 6s, infinity)
    #[arg(long, value_name = "DURATION", default_value = "15m")]
    pub cache_retention: String,

    /// Interval between cache clean-ups (e.g. 1m)
    #[arg(long, value_name = "DURATION", default_value = "1m")]
    pub cache_cleanup: String,

    /// Files to convert
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,
}

impl ConvertArgs {
    /// Builds the converter configuration from the parsed flags
    pub fn converter_config(&self) -> Result<ConverterConfig, CliError> {
        Ok(ConverterConfig {
            rules_path: self.rules.clone(),
            engine: self.engine.engine_config(),
            cache: CacheConfig {
                enabled: self.cache,
                retention: parse_retention(&self.cache_retention)?,
                sweep_interval: parse_duration(&self.cache_cleanup)?,
            },
        })
    }

    /// Content type for `input`: the explicit flag, or a guess from its extension
    pub fn content_type_for(&self, input: &Path) -> Result<String, CliError> {
        if let Some(content_type) = &self.content_type {
            return Ok(content_type.clone());
        }
        infer_content_type(input)
            .map(str::to_string)
            .ok_or_else(|| CliError::UnknownInputType(input.to_path_buf()))
    }
}

/// Guesses a media type from a file extension
pub fn infer_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "json" => Some("application/json"),
        "csv" => Some("text/csv"),
        "xml" => Some("application/xml"),
        _ => None,
    }
}
