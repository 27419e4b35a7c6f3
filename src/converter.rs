//! Conversion of structured input to RDF
//!
//! [`Converter`] ties the pieces together for one request: fingerprint lookup in
//! the result cache, loading the RML rules, running the engine, and installing
//! the engine binary when the engine reports it missing.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::cache::{CacheStats, ConversionCache};
use crate::config::ConverterConfig;
use crate::dependency::{DependencyError, DependencyManager, DependencyProvider};
use crate::engine::{
    Engine, EngineError, MappingOutput, MappingRequest, RmlMapperEngine, Serialization,
};

/// Serialization every conversion produces
pub const OUTPUT_SERIALIZATION: Serialization = Serialization::Turtle;

/// Errors that can occur while converting input to RDF
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The request itself is unusable (missing content type, empty body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No RML rules at the configured location
    #[error("RML file is not found: {}", .0.display())]
    RulesetNotFound(PathBuf),

    /// The RML rules exist but could not be read
    #[error("Failed to read RML file: {0}")]
    RulesetRead(#[source] std::io::Error),

    /// The latest engine release has no usable binary
    #[error("Engine dependency not found: {0}")]
    DependencyNotFound(String),

    /// Downloading the engine failed
    #[error("Network error while fetching engine: {0}")]
    Network(String),

    /// The downloaded engine could not be stored
    #[error("Failed to install engine: {0}")]
    DependencyIo(String),

    /// The engine ran but produced nothing
    #[error("Could not convert the input to valid RDF")]
    ConversionFailed,

    /// Any other engine failure
    #[error("Engine failed: {0}")]
    Engine(#[from] EngineError),
}

impl ConvertError {
    /// Whether the caller can fix this by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, ConvertError::InvalidRequest(_))
    }

    /// HTTP status a request boundary should answer with
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

impl From<DependencyError> for ConvertError {
    fn from(err: DependencyError) -> Self {
        match err {
            DependencyError::NotFound(_) => ConvertError::DependencyNotFound(err.to_string()),
            DependencyError::Network(_) | DependencyError::Parse(_) => {
                ConvertError::Network(err.to_string())
            }
            DependencyError::Io(_) => ConvertError::DependencyIo(err.to_string()),
        }
    }
}

/// A conversion request as handed over by a transport layer
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    /// Raw request body
    pub data: Vec<u8>,
    /// Declared media type of `data`, e.g. `application/json`
    pub content_type: Option<String>,
    /// Identifier used to correlate log lines of one request
    pub correlation_id: Option<String>,
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedOutput {
    /// Serialized RDF graph
    pub body: String,
    /// Media type of `body`
    pub content_type: &'static str,
}

/// Name under which input of the given media type is exposed to the rules
///
/// `application/json` becomes `data.json`, `text/csv; charset=utf-8` becomes
/// `data.csv`.
pub fn source_name(content_type: &str) -> Result<String, ConvertError> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let subtype = essence
        .split_once('/')
        .map(|(_, subtype)| subtype.trim())
        .filter(|subtype| !subtype.is_empty())
        .ok_or_else(|| {
            ConvertError::InvalidRequest(format!("Unsupported content type: '{}'", content_type))
        })?;

    Ok(format!("data.{}", subtype.to_lowercase()))
}

/// Converts structured input to Turtle using RML rules
pub struct Converter {
    rules_path: PathBuf,
    cache: ConversionCache,
    engine: Arc<dyn Engine>,
    dependencies: Arc<dyn DependencyProvider>,
}

impl Converter {
    /// Creates a converter backed by RMLMapper and its GitHub releases
    ///
    /// Must be called inside a tokio runtime when caching is enabled, so the
    /// cache sweep can be scheduled.
    pub fn new(config: &ConverterConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(RmlMapperEngine::new(&config.engine)),
            Arc::new(DependencyManager::new(config.engine.jar_path.clone())),
        )
    }

    /// Creates a converter with a custom engine and dependency provider
    pub fn with_components(
        config: &ConverterConfig,
        engine: Arc<dyn Engine>,
        dependencies: Arc<dyn DependencyProvider>,
    ) -> Self {
        Self {
            rules_path: config.rules_path.clone(),
            cache: ConversionCache::new(&config.cache),
            engine,
            dependencies,
        }
    }

    pub fn cache(&self) -> &ConversionCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Handles a transport-level request, logging under its correlation id
    pub async fn handle(&self, request: ConversionRequest) -> Result<ConvertedOutput, ConvertError> {
        let span = tracing::info_span!(
            "convert",
            correlation_id = request.correlation_id.as_deref().unwrap_or("-")
        );
        self.convert(&request.data, request.content_type.as_deref())
            .instrument(span)
            .await
    }

    /// Converts `raw` (declared as `content_type`) to Turtle
    pub async fn convert(
        &self,
        raw: &[u8],
        content_type: Option<&str>,
    ) -> Result<ConvertedOutput, ConvertError> {
        let content_type = content_type
            .ok_or_else(|| ConvertError::InvalidRequest("Content type can't be undefined".into()))?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ConvertError::InvalidRequest(
                "Empty input is not allowed".into(),
            ));
        }
        let source = source_name(content_type)?;
        let data = std::str::from_utf8(raw)
            .map_err(|_| ConvertError::InvalidRequest("Input is not valid UTF-8".into()))?;

        if let Some(body) = self.cache.lookup(raw) {
            return Ok(ConvertedOutput {
                body,
                content_type: OUTPUT_SERIALIZATION.media_type(),
            });
        }

        let rules = self.load_rules().await?;
        let request = MappingRequest {
            serialization: OUTPUT_SERIALIZATION,
            ..MappingRequest::single_source(source, data)
        };

        let result = self.execute_with_install(&rules, &request).await?;
        let body = result
            .output
            .filter(|rdf| !rdf.trim().is_empty())
            .ok_or(ConvertError::ConversionFailed)?;

        self.cache.store(raw, &body);

        Ok(ConvertedOutput {
            body,
            content_type: OUTPUT_SERIALIZATION.media_type(),
        })
    }

    /// Stops the periodic cache sweep
    pub fn stop(&self) {
        self.cache.stop();
    }

    async fn load_rules(&self) -> Result<String, ConvertError> {
        match tokio::fs::read_to_string(&self.rules_path).await {
            Ok(rules) => Ok(rules),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ConvertError::RulesetNotFound(self.rules_path.clone()))
            }
            Err(e) => Err(ConvertError::RulesetRead(e)),
        }
    }

    /// Runs the engine, installing its binary and retrying once if it is missing
    async fn execute_with_install(
        &self,
        rules: &str,
        request: &MappingRequest,
    ) -> Result<MappingOutput, ConvertError> {
        debug!(sources = ?request.sources.keys().collect::<Vec<_>>(), "Invoking engine");

        match self.engine.execute(rules, request).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_binary_missing() => {
                warn!(error = %e, "Engine binary missing, installing it");
                let version = self.dependencies.ensure_available().await?;
                info!(version = %version, "Engine installed, retrying conversion");
                Ok(self.engine.execute(rules, request).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
