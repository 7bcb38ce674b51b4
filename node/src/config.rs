//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use ccn_cost::CostPolicy;
use ccn_types::{Address, Chain, Timestamp};

use crate::NodeError;

/// Configuration for a CCN node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Chains whose messages and confirmations this node accepts.
    #[serde(default = "default_chains")]
    pub chains: Vec<Chain>,

    /// Owner of the pricing aggregate consulted by the cost engine.
    #[serde(default = "default_pricing_owner")]
    pub pricing_owner: Address,

    /// Address whose balance aggregates are ingested as the token balance
    /// table.
    #[serde(default = "default_balance_sync_address")]
    pub balance_sync_address: Address,

    /// Unix seconds of the economic precision cutover (1× before, 10 000×
    /// after), applied by message time.
    #[serde(default)]
    pub price_scale_cutover_secs: u64,

    /// Whether stream-paid messages are accepted.
    #[serde(default = "default_true")]
    pub allow_stream: bool,

    /// Whether credit-paid messages are accepted.
    #[serde(default = "default_true")]
    pub allow_credit: bool,

    /// Minimum runtime, in hours, a credit-paid message must fund upfront.
    #[serde(default = "default_credit_min_runtime_hours")]
    pub credit_min_runtime_hours: u32,

    /// Base retry backoff in seconds (doubles per retry).
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Backoff cap in seconds.
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,

    /// Retry count past which the operator is alerted in the logs.
    #[serde(default = "default_retry_alert_threshold")]
    pub retry_alert_threshold: u32,

    /// How many due pending rows one drain pass picks up.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of pipeline drain workers.
    #[serde(default = "default_pipeline_workers")]
    pub pipeline_workers: usize,

    /// Seconds between drain passes when the queue is empty.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Bounded capacity of the gossip intake queue.
    #[serde(default = "default_gossip_queue_size")]
    pub gossip_queue_size: usize,

    /// How long an admission claim on an item hash stays valid.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,

    /// Grace period before unreferenced or forgotten content is deleted.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// HTTP gateway of the content storage service.
    #[serde(default = "default_content_gateway")]
    pub content_gateway: String,

    /// Timeout for content fetches, in seconds.
    #[serde(default = "default_content_timeout_secs")]
    pub content_timeout_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ccn_data")
}

fn default_map_size() -> usize {
    64 * 1024 * 1024 * 1024
}

fn default_chains() -> Vec<Chain> {
    Chain::ALL.to_vec()
}

fn default_pricing_owner() -> Address {
    Address::new("0x0000000000000000000000000000000000000001")
}

fn default_balance_sync_address() -> Address {
    Address::new("0x0000000000000000000000000000000000000002")
}

fn default_true() -> bool {
    true
}

fn default_credit_min_runtime_hours() -> u32 {
    24
}

fn default_retry_base_secs() -> u64 {
    30
}

fn default_retry_max_secs() -> u64 {
    3_600
}

fn default_retry_alert_threshold() -> u32 {
    20
}

fn default_batch_size() -> usize {
    64
}

fn default_pipeline_workers() -> usize {
    4
}

fn default_drain_interval_secs() -> u64 {
    2
}

fn default_gossip_queue_size() -> usize {
    4_096
}

fn default_claim_ttl_secs() -> u64 {
    300
}

fn default_grace_period_secs() -> u64 {
    3_600
}

fn default_content_gateway() -> String {
    "http://127.0.0.1:4024".to_string()
}

fn default_content_timeout_secs() -> u64 {
    30
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// The cost policy derived from this configuration.
    pub fn cost_policy(&self) -> CostPolicy {
        CostPolicy {
            price_scale_cutover: Timestamp::from_secs(self.price_scale_cutover_secs),
            allow_stream: self.allow_stream,
            allow_credit: self.allow_credit,
            credit_min_runtime_hours: self.credit_min_runtime_hours,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            chains: default_chains(),
            pricing_owner: default_pricing_owner(),
            balance_sync_address: default_balance_sync_address(),
            price_scale_cutover_secs: 0,
            allow_stream: true,
            allow_credit: true,
            credit_min_runtime_hours: default_credit_min_runtime_hours(),
            retry_base_secs: default_retry_base_secs(),
            retry_max_secs: default_retry_max_secs(),
            retry_alert_threshold: default_retry_alert_threshold(),
            batch_size: default_batch_size(),
            pipeline_workers: default_pipeline_workers(),
            drain_interval_secs: default_drain_interval_secs(),
            gossip_queue_size: default_gossip_queue_size(),
            claim_ttl_secs: default_claim_ttl_secs(),
            grace_period_secs: default_grace_period_secs(),
            content_gateway: default_content_gateway(),
            content_timeout_secs: default_content_timeout_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.retry_base_secs, 30);
        assert_eq!(config.chains.len(), 3);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            retry_base_secs = 5
            chains = ["hex", "solana"]
            allow_credit = false
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.retry_base_secs, 5);
        assert_eq!(config.chains, vec![Chain::Hex, Chain::Solana]);
        assert!(!config.allow_credit);
        assert_eq!(config.batch_size, 64); // default
    }

    #[test]
    fn cost_policy_reflects_cutover() {
        let config = NodeConfig {
            price_scale_cutover_secs: 1_700_000_000,
            ..NodeConfig::default()
        };
        let policy = config.cost_policy();
        assert_eq!(policy.price_scale_cutover, Timestamp::from_secs(1_700_000_000));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/ccn.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
