use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use contentflow_core::config::RegistryConfig;
use contentflow_core::{AnalysisBackend, BackendId, Capability};

use crate::error::StoreError;
use crate::traits::BackendRegistry;

/// Back-end registry loaded once from a TOML file.
///
/// ```toml
/// [[backends]]
/// backend_id = 1
/// endpoint = "http://analysis-1.local/rest"
/// capabilities = ["PHOTO_ANALYSIS", "PHOTO_SEARCH", "BACKEND_FEEDBACK"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRegistry {
    #[serde(default)]
    backends: Vec<AnalysisBackend>,
}

impl StaticRegistry {
    pub fn new(backends: Vec<AnalysisBackend>) -> Result<Self, StoreError> {
        let registry = Self { backends };
        registry.validate()?;
        Ok(registry)
    }

    /// Parse a registry from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, StoreError> {
        let mut registry: Self = toml::from_str(toml_str)?;
        registry.apply_env_overrides();
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let registry = Self::from_toml(&content)?;
        info!(
            path = %path.as_ref().display(),
            backends = registry.backends.len(),
            "loaded backend registry"
        );
        Ok(registry)
    }

    /// Load from `CONTENTFLOW_BACKENDS_FILE` if set, otherwise from the configured path.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, StoreError> {
        match std::env::var("CONTENTFLOW_BACKENDS_FILE") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Self::from_file(&config.backends_file),
        }
    }

    pub fn all(&self) -> &[AnalysisBackend] {
        &self.backends
    }

    // ── Environment variable overrides ──────────────────────────────

    /// `CONTENTFLOW_DISABLED_BACKENDS=2,5` disables the listed back-ends.
    fn apply_env_overrides(&mut self) {
        let Ok(v) = std::env::var("CONTENTFLOW_DISABLED_BACKENDS") else {
            return;
        };
        let disabled: HashSet<BackendId> = v
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect();
        for backend in &mut self.backends {
            if disabled.contains(&backend.backend_id) {
                backend.enabled = false;
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.backend_id) {
                return Err(StoreError::Registry(format!(
                    "duplicate backend id {}",
                    backend.backend_id
                )));
            }
            if let Err(e) = url::Url::parse(&backend.endpoint) {
                return Err(StoreError::Registry(format!(
                    "backend {} has invalid endpoint '{}': {e}",
                    backend.backend_id, backend.endpoint
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackendRegistry for StaticRegistry {
    async fn backends(&self, required: &[Capability]) -> Result<Vec<AnalysisBackend>, StoreError> {
        Ok(self
            .backends
            .iter()
            .filter(|b| b.enabled && b.has_capabilities(required))
            .cloned()
            .collect())
    }

    async fn backend(&self, backend_id: BackendId) -> Result<Option<AnalysisBackend>, StoreError> {
        Ok(self.backends.iter().find(|b| b.backend_id == backend_id).cloned())
    }
}
