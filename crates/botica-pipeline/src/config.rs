//! # Pipeline Configuration
//!
//! Configuration management for the fetch & reconciliation pipeline.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOTICA_API_URL=https://pos.example.com/api                         │
//! │     BOTICA_NODES="1:Farmacia Centro,2:Farmacia Norte"                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/botica/pipeline.toml (Linux)                             │
//! │     ~/Library/Application Support/com.botica.analytics/pipeline.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost API, both branch nodes, stock lookup tables              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # pipeline.toml
//! [api]
//! base_url = "https://pos.example.com/api"
//! bearer_token = "..."
//! timeout_secs = 30
//!
//! [[nodes]]
//! code = "1"
//! branch = "Farmacia Centro"
//!
//! [[nodes]]
//! code = "2"
//! branch = "Farmacia Norte"
//!
//! [sync]
//! inter_day_delay_ms = 1000
//!
//! [database]
//! path = "botica.db"
//!
//! [lookups.seller_aliases.aliases]
//! "lu" = "Lucia Perez"
//! ```
//!
//! The `[lookups]` tables feed the canonicalizer: classifier keyword sets,
//! seller aliases, supplier classification and the product master. All of
//! them have working defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use botica_core::lookup::{ProductMaster, SellerAliasMap, SupplierKindMap};
use botica_core::{Canonicalizer, ClassifierConfig};

// =============================================================================
// API Settings
// =============================================================================

/// Connection settings for the upstream POS API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the POS API, without the `/documents/...` suffix.
    pub base_url: String,

    /// Bearer token sent with every request when set.
    pub bearer_token: Option<String>,

    /// Optional upstream API mode, forwarded as a `mode` query parameter.
    /// Some installations expose a reporting mode with steadier payloads.
    pub mode: Option<String>,

    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            bearer_token: None,
            mode: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// =============================================================================
// Store Nodes
// =============================================================================

/// One store node as addressed by the upstream API.
///
/// The `code` goes into the request query; the `branch` is the display
/// name every fetched document gets tagged with. Branch filtering in the
/// rollups is a substring match on that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node code used by the upstream API.
    pub code: String,

    /// Branch name the node belongs to.
    pub branch: String,
}

fn default_nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig {
            code: "1".to_string(),
            branch: "Farmacia Centro".to_string(),
        },
        NodeConfig {
            code: "2".to_string(),
            branch: "Farmacia Norte".to_string(),
        },
    ]
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Fetch pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Pause after each fetched day (milliseconds). The upstream platform
    /// throttles bursts; one second keeps multi-week backfills under its
    /// limit.
    pub inter_day_delay_ms: u64,
}

fn default_inter_day_delay() -> u64 {
    1_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            inter_day_delay_ms: default_inter_day_delay(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Where the canonical store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file path.
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("botica.db"),
        }
    }
}

// =============================================================================
// Lookup Tables
// =============================================================================

/// The injected reference data the canonicalizer runs against.
///
/// Modeled as configuration rather than constants: institutions, wallet
/// brands and supplier classifications change without a code release.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Payment classifier keyword sets and code map.
    pub classifier: ClassifierConfig,

    /// Seller name variants → canonical spelling.
    pub seller_aliases: SellerAliasMap,

    /// Supplier → expense kind classification.
    pub supplier_kinds: SupplierKindMap,

    /// Barcode/name → category, manufacturer, cost.
    pub product_master: ProductMaster,
}

// =============================================================================
// Main Pipeline Configuration
// =============================================================================

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upstream POS API settings.
    pub api: ApiConfig,

    /// Store nodes to fetch, one entry per `(code, branch)`.
    pub nodes: Vec<NodeConfig>,

    /// Fetch pacing.
    pub sync: SyncSettings,

    /// Canonical store location.
    pub database: DatabaseSettings,

    /// Injected lookup tables.
    pub lookups: LookupSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            api: ApiConfig::default(),
            nodes: default_nodes(),
            sync: SyncSettings::default(),
            database: DatabaseSettings::default(),
            lookups: LookupSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (pipeline.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PipelineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading pipeline config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load pipeline config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> PipelineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PipelineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Pipeline config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(PipelineError::InvalidConfig(format!(
                "api.base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.nodes.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one store node must be configured".into(),
            ));
        }
        for node in &self.nodes {
            if node.code.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "node code must not be empty".into(),
                ));
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|n| n.code == node.code) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate node code: {}",
                    node.code
                )));
            }
        }

        // Unusable keyword sets would silently classify everything as cash.
        self.lookups.classifier.validate()?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BOTICA_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(token) = std::env::var("BOTICA_API_TOKEN") {
            self.api.bearer_token = Some(token);
        }

        if let Ok(mode) = std::env::var("BOTICA_API_MODE") {
            self.api.mode = Some(mode);
        }

        if let Ok(timeout) = std::env::var("BOTICA_API_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.api.timeout_secs = secs;
            }
        }

        if let Ok(path) = std::env::var("BOTICA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(delay) = std::env::var("BOTICA_INTER_DAY_DELAY_MS") {
            if let Ok(ms) = delay.parse::<u64>() {
                self.sync.inter_day_delay_ms = ms;
            }
        }

        if let Ok(spec) = std::env::var("BOTICA_NODES") {
            match parse_node_spec(&spec) {
                Some(nodes) => {
                    debug!(count = nodes.len(), "Overriding store nodes from environment");
                    self.nodes = nodes;
                }
                None => warn!(spec = %spec, "Unparsable BOTICA_NODES value, keeping configured nodes"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "botica", "analytics").map(|dirs| {
            let config_dir = dirs.config_dir();
            config_dir.join("pipeline.toml")
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the pause between fetched days.
    pub fn inter_day_delay(&self) -> Duration {
        Duration::from_millis(self.sync.inter_day_delay_ms)
    }

    /// Builds the canonicalizer from the configured lookup tables.
    pub fn canonicalizer(&self) -> PipelineResult<Canonicalizer> {
        let canon = Canonicalizer::new(
            self.lookups.classifier.clone(),
            self.lookups.seller_aliases.clone(),
            self.lookups.supplier_kinds.clone(),
            self.lookups.product_master.clone(),
        )?;
        Ok(canon)
    }
}

/// Parses a `"code:branch,code:branch"` node list. Whole-spec failure
/// returns `None` so a typo cannot half-replace the configured fleet.
fn parse_node_spec(spec: &str) -> Option<Vec<NodeConfig>> {
    let mut nodes = Vec::new();
    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (code, branch) = entry.split_once(':')?;
        let code = code.trim();
        let branch = branch.trim();
        if code.is_empty() || branch.is_empty() {
            return None;
        }
        nodes.push(NodeConfig {
            code: code.to_string(),
            branch: branch.to_string(),
        });
    }
    if nodes.is_empty() {
        None
    } else {
        Some(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.sync.inter_day_delay_ms, 1_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();

        config.api.base_url = "ftp://pos.example.com".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = default_base_url();
        config.nodes.clear();
        assert!(config.validate().is_err());

        config.nodes = default_nodes();
        config.nodes[1].code = config.nodes[0].code.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_classifier_keyword_fails_validation() {
        let mut config = PipelineConfig::default();
        config.lookups.classifier.wallet_brands.push("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_spec_parsing() {
        let nodes = parse_node_spec("1:Farmacia Centro, 2:Farmacia Norte").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].code, "1");
        assert_eq!(nodes[1].branch, "Farmacia Norte");

        assert!(parse_node_spec("").is_none());
        assert!(parse_node_spec("no-colon").is_none());
        assert!(parse_node_spec("1:").is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[[nodes]]"));

        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.nodes, config.nodes);
        assert_eq!(parsed.api.timeout_secs, config.api.timeout_secs);
    }

    #[test]
    fn test_empty_file_is_a_valid_config() {
        let parsed: PipelineConfig = toml::from_str("").unwrap();
        assert!(parsed.validate().is_ok());
        assert!(!parsed.nodes.is_empty());
    }

    #[test]
    fn test_canonicalizer_from_lookups() {
        let config = PipelineConfig::default();
        let canon = config.canonicalizer().unwrap();
        assert_eq!(
            canon.config().individual_entity,
            config.lookups.classifier.individual_entity
        );
    }
}
