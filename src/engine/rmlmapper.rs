//! RMLMapper process engine
//!
//! Runs the RMLMapper jar with `java -jar` inside a scratch directory. The rules
//! and every source are written there first so source names referenced by the
//! rules (such as `data.json`) resolve relative to the process working directory.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use super::{Engine, EngineError, MappingOutput, MappingRequest};
use crate::config::EngineConfig;

/// File name the rules are written to
const MAPPING_FILE: &str = "mapping.rml.ttl";

/// File name the engine writes its output to
const OUTPUT_FILE: &str = "output.ttl";

/// File name for provenance metadata, when requested
const METADATA_FILE: &str = "metadata.ttl";

/// What the JVM prints when the jar given to `-jar` cannot be opened
const JAR_UNREADABLE: &str = "Unable to access jarfile";

/// Number of stderr lines kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Engine backed by the RMLMapper jar
#[derive(Debug, Clone)]
pub struct RmlMapperEngine {
    jar_path: PathBuf,
    java_bin: PathBuf,
}

impl RmlMapperEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            jar_path: config.jar_path.clone(),
            java_bin: config.java_bin.clone(),
        }
    }

    /// Location of the jar this engine runs
    pub fn jar_path(&self) -> &Path {
        &self.jar_path
    }

    /// Arguments passed to `java` for the given jar and request
    fn command_args(jar: &Path, request: &MappingRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-jar".into(),
            jar.as_os_str().to_owned(),
            "-m".into(),
            MAPPING_FILE.into(),
            "-o".into(),
            OUTPUT_FILE.into(),
            "-s".into(),
            request.serialization.as_str().into(),
        ];
        if request.generate_metadata {
            args.extend(
                ["-e", METADATA_FILE, "-l", "dataset"]
                    .into_iter()
                    .map(OsString::from),
            );
        }
        args
    }

    /// Resolves the jar to an absolute path, or reports it missing
    async fn locate_jar(&self) -> Result<PathBuf, EngineError> {
        match tokio::fs::canonicalize(&self.jar_path).await {
            Ok(path) => Ok(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(EngineError::binary_missing(format!(
                "RMLMapper jar not found at {}",
                self.jar_path.display()
            ))),
            Err(e) => Err(EngineError::io(format!(
                "Cannot access RMLMapper jar at {}: {}",
                self.jar_path.display(),
                e
            ))),
        }
    }

    /// Writes the rules and sources into `dir`
    async fn prepare_workdir(
        dir: &Path,
        rules: &str,
        request: &MappingRequest,
    ) -> Result<(), EngineError> {
        tokio::fs::write(dir.join(MAPPING_FILE), rules)
            .await
            .map_err(|e| EngineError::io(format!("Failed to write mapping rules: {}", e)))?;

        for (name, data) in &request.sources {
            if !is_plain_file_name(name) {
                return Err(EngineError::io(format!("Invalid source name: '{}'", name)));
            }
            tokio::fs::write(dir.join(name), data)
                .await
                .map_err(|e| EngineError::io(format!("Failed to write source {}: {}", name, e)))?;
        }

        Ok(())
    }
}

/// Whether `name` is a single path component that stays inside the work dir
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != MAPPING_FILE
        && name != OUTPUT_FILE
        && name != METADATA_FILE
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Keeps the last few lines of engine stderr
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Engine for RmlMapperEngine {
    async fn execute(
        &self,
        rules: &str,
        request: &MappingRequest,
    ) -> Result<MappingOutput, EngineError> {
        let jar = self.locate_jar().await?;

        let workdir = tempfile::tempdir()
            .map_err(|e| EngineError::io(format!("Failed to create work directory: {}", e)))?;
        Self::prepare_workdir(workdir.path(), rules, request).await?;

        debug!(
            jar = %jar.display(),
            sources = request.sources.len(),
            serialization = request.serialization.as_str(),
            "Running RMLMapper"
        );

        let output = Command::new(&self.java_bin)
            .args(Self::command_args(&jar, request))
            .current_dir(workdir.path())
            .output()
            .await
            .map_err(|e| {
                EngineError::io(format!(
                    "Failed to start {}: {}",
                    self.java_bin.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr);
            if tail.contains(JAR_UNREADABLE) {
                return Err(EngineError::binary_missing(tail));
            }
            return Err(EngineError::execution_failed(format!(
                "RMLMapper exited with {}: {}",
                output.status, tail
            )));
        }

        match tokio::fs::read_to_string(workdir.path().join(OUTPUT_FILE)).await {
            Ok(rdf) => Ok(MappingOutput { output: Some(rdf) }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(MappingOutput { output: None }),
            Err(e) => Err(EngineError::io(format!("Failed to read engine output: {}", e))),
        }
    }
}
