use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemoConfig {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub workspace: WorkspaceConfig,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    /// Optional api-key header value. Must be at least 8 characters when set.
    pub api_key: Option<String>,
    pub collection: String,
    /// Per-RPC timeout in milliseconds.
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"auto"`, `"remote"`, or `"local"`. Auto selects remote when an API
    /// key is present.
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub small_model: String,
    pub large_model: String,
    /// Dimension of the `dense` vector space when the remote provider is used.
    pub remote_small_dims: usize,
    /// Dimension of the `dense_large` vector space (remote provider).
    pub large_dims: usize,
    pub local_model: String,
    /// Dimension of the local model's output; used for both spaces when the
    /// local provider is active.
    pub local_dims: usize,
    pub model_cache_dir: String,
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters; content longer than this is auto-chunked.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub auto_detect: bool,
    pub default_workspace: Option<String>,
    pub cache_ttl_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Number of medium-confidence secret matches that blocks a write.
    pub medium_block_threshold: usize,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            workspace: WorkspaceConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            api_key: None,
            collection: "mcp-memory".into(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let model_cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mcp-memory/models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "auto".into(),
            openai_api_key: None,
            small_model: "text-embedding-3-small".into(),
            large_model: "text-embedding-3-large".into(),
            remote_small_dims: 1536,
            large_dims: 3072,
            local_model: "Xenova/all-MiniLM-L6-v2".into(),
            local_dims: 384,
            model_cache_dir,
            cache_capacity: 10_000,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            default_workspace: None,
            cache_ttl_ms: 60_000,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            medium_block_threshold: 3,
        }
    }
}

/// Returns `~/.mnemo/`
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

/// Which embedding provider the config selects after auto-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Remote,
    Local,
}

impl MnemoConfig {
    /// Load config from the TOML file (if it exists) then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `MNEMO_*` (and `OPENAI_API_KEY`) environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_QDRANT_URL") {
            self.qdrant.url = val;
        }
        if let Ok(val) = std::env::var("MNEMO_QDRANT_API_KEY") {
            self.qdrant.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("MNEMO_COLLECTION") {
            self.qdrant.collection = val;
        }
        if let Ok(val) = std::env::var("MNEMO_QDRANT_TIMEOUT_MS") {
            if let Ok(parsed) = val.parse() {
                self.qdrant.timeout_ms = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.embedding.openai_api_key = Some(val);
        }
        if let Ok(val) = std::env::var("MNEMO_LOCAL_MODEL") {
            self.embedding.local_model = val;
        }
        if let Ok(val) = std::env::var("MNEMO_LOCAL_DIMS") {
            if let Ok(parsed) = val.parse() {
                self.embedding.local_dims = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_LARGE_DIMS") {
            if let Ok(parsed) = val.parse() {
                self.embedding.large_dims = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_MODEL_CACHE_DIR") {
            self.embedding.model_cache_dir = val;
        }
        if let Ok(val) = std::env::var("MNEMO_CHUNK_SIZE") {
            if let Ok(parsed) = val.parse() {
                self.chunking.chunk_size = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_CHUNK_OVERLAP") {
            if let Ok(parsed) = val.parse() {
                self.chunking.chunk_overlap = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_WORKSPACE_AUTO_DETECT") {
            self.workspace.auto_detect = val != "false" && val != "0";
        }
        if let Ok(val) = std::env::var("MNEMO_DEFAULT_WORKSPACE") {
            self.workspace.default_workspace = Some(val);
        }
        if let Ok(val) = std::env::var("MNEMO_WORKSPACE_CACHE_TTL_MS") {
            if let Ok(parsed) = val.parse() {
                self.workspace.cache_ttl_ms = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_SECRET_BLOCK_THRESHOLD") {
            if let Ok(parsed) = val.parse() {
                self.scanner.medium_block_threshold = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.qdrant.api_key {
            anyhow::ensure!(
                key.len() >= 8,
                "qdrant.api_key must be at least 8 characters"
            );
        }
        anyhow::ensure!(
            self.chunking.chunk_overlap < self.chunking.chunk_size,
            "chunking.chunk_overlap must be smaller than chunking.chunk_size"
        );
        if self.embedding.provider == "remote" {
            anyhow::ensure!(
                self.embedding.openai_api_key.is_some(),
                "embedding.provider = \"remote\" requires an OpenAI API key"
            );
        }
        Ok(())
    }

    /// Provider selection: `remote` needs the key; `auto` picks remote when
    /// the key is present and local otherwise.
    pub fn provider_kind(&self) -> ProviderKind {
        match self.embedding.provider.as_str() {
            "remote" => ProviderKind::Remote,
            "local" => ProviderKind::Local,
            _ => {
                if self.embedding.openai_api_key.is_some() {
                    ProviderKind::Remote
                } else {
                    ProviderKind::Local
                }
            }
        }
    }

    /// `(D_s, D_l)` for the active provider. The local pipeline emits one
    /// vector reused for both spaces.
    pub fn vector_dims(&self) -> (usize, usize) {
        match self.provider_kind() {
            ProviderKind::Remote => (self.embedding.remote_small_dims, self.embedding.large_dims),
            ProviderKind::Local => (self.embedding.local_dims, self.embedding.local_dims),
        }
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_model_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.embedding.model_cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemoConfig::default();
        assert_eq!(config.qdrant.url, "http://localhost:6333");
        assert_eq!(config.qdrant.collection, "mcp-memory");
        assert_eq!(config.qdrant.timeout_ms, 30_000);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.scanner.medium_block_threshold, 3);
        assert!(config.workspace.auto_detect);
        config.validate().unwrap();
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[qdrant]
url = "http://qdrant.internal:6333"
collection = "team-memory"

[embedding]
provider = "local"
local_dims = 512

[scanner]
medium_block_threshold = 5
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.qdrant.url, "http://qdrant.internal:6333");
        assert_eq!(config.qdrant.collection, "team-memory");
        assert_eq!(config.embedding.local_dims, 512);
        assert_eq!(config.scanner.medium_block_threshold, 5);
        // defaults still apply for unset fields
        assert_eq!(config.qdrant.timeout_ms, 30_000);
        assert_eq!(config.chunking.chunk_size, 1000);
    }

    #[test]
    fn auto_provider_follows_api_key() {
        let mut config = MnemoConfig::default();
        assert_eq!(config.provider_kind(), ProviderKind::Local);
        config.embedding.openai_api_key = Some("sk-test".into());
        assert_eq!(config.provider_kind(), ProviderKind::Remote);
        config.embedding.provider = "local".into();
        assert_eq!(config.provider_kind(), ProviderKind::Local);
    }

    #[test]
    fn vector_dims_per_provider() {
        let mut config = MnemoConfig::default();
        assert_eq!(config.vector_dims(), (384, 384));
        config.embedding.openai_api_key = Some("sk-test".into());
        assert_eq!(config.vector_dims(), (1536, 3072));
    }

    #[test]
    fn short_qdrant_key_rejected() {
        let mut config = MnemoConfig::default();
        config.qdrant.api_key = Some("short".into());
        assert!(config.validate().is_err());
        config.qdrant.api_key = Some("long-enough-key".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn remote_without_key_rejected() {
        let mut config = MnemoConfig::default();
        config.embedding.provider = "remote".into();
        assert!(config.validate().is_err());
    }
}
