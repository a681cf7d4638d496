//! Configuration management for the relay node
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::chain::Blockchain;
use crate::protocol;
use crate::tx::FeePolicy;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: BTreeMap<Blockchain, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Protocol version the node speaks, e.g. "0.3.0"
    pub protocol: String,
    #[serde(default = "default_flush_interval")]
    pub health_flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    pub provider: String,
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Average block time in seconds, fractions allowed
    pub average_block_time: f64,
    pub confirmations: u64,
    pub chain_id: u64,
    pub hub: String,
    pub forwarder: String,
    pub token: String,
    /// Path to an encrypted keystore, or a hex private key
    pub private_key: String,
    #[serde(default)]
    pub private_key_password: String,
    pub min_adaptable_fee_per_gas: u64,
    /// Zero means no cap
    #[serde(default)]
    pub max_total_fee_per_gas: Option<u64>,
    pub adaptable_fee_increase_factor: f64,
    pub blocks_until_resubmission: u64,
}

impl ChainConfig {
    /// All RPC endpoints of the chain, primary first
    pub fn rpc_nodes(&self) -> Vec<String> {
        std::iter::once(self.provider.clone())
            .chain(self.fallback_providers.iter().cloned())
            .collect()
    }

    /// Zero when the configured value is not a valid duration
    pub fn average_block_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.average_block_time).unwrap_or_default()
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy::new(
            self.min_adaptable_fee_per_gas.into(),
            self.max_total_fee_per_gas.map(Into::into),
            self.adaptable_fee_increase_factor,
            self.blocks_until_resubmission,
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_flush_interval() -> u64 {
    60
}

impl Settings {
    /// Load settings from the file named by `RELAY_NODE_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("RELAY_NODE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let version = protocol::parse_protocol_version(&self.node.protocol)?;
        if !protocol::is_supported_protocol_version(&version) {
            anyhow::bail!("Protocol version {} is not supported", version);
        }

        if self.active_chains().is_empty() {
            anyhow::bail!("At least one chain must be active");
        }

        for (blockchain, chain) in self.active_chains() {
            if chain.provider.is_empty() {
                anyhow::bail!("Chain {} has no provider configured", blockchain);
            }
            if chain.adaptable_fee_increase_factor <= 1.0 {
                anyhow::bail!(
                    "Chain {} must have an adaptable fee increase factor above 1",
                    blockchain
                );
            }
            if !(chain.average_block_time.is_finite() && chain.average_block_time > 0.0) {
                anyhow::bail!(
                    "Chain {} must have a positive average block time",
                    blockchain
                );
            }
            if chain.blocks_until_resubmission == 0 {
                anyhow::bail!(
                    "Chain {} must wait at least one block before resubmission",
                    blockchain
                );
            }
            if chain.hub.is_empty() {
                tracing::warn!("Chain {} has no hub address configured", blockchain);
            }
        }

        Ok(())
    }

    /// Get active chains
    pub fn active_chains(&self) -> Vec<(Blockchain, &ChainConfig)> {
        self.chains
            .iter()
            .filter(|(_, c)| c.active)
            .map(|(b, c)| (*b, c))
            .collect()
    }

    /// Configured RPC endpoints of every chain, ordered by chain
    pub fn rpc_nodes(&self) -> BTreeMap<Blockchain, Vec<String>> {
        self.chains
            .iter()
            .map(|(blockchain, chain)| (*blockchain, chain.rpc_nodes()))
            .collect()
    }

    pub fn chain(&self, blockchain: Blockchain) -> Option<&ChainConfig> {
        self.chains.get(&blockchain)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn sample_chain_config() -> ChainConfig {
        ChainConfig {
            active: true,
            provider: "https://rpc.example/v1/secretkey".to_string(),
            fallback_providers: vec!["https://fallback.example/".to_string()],
            provider_timeout_secs: 5,
            average_block_time: 2.0,
            confirmations: 3,
            chain_id: 137,
            hub: "0x1000000000000000000000000000000000000001".to_string(),
            forwarder: "0x2000000000000000000000000000000000000002".to_string(),
            token: "0x3000000000000000000000000000000000000003".to_string(),
            private_key: "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                .to_string(),
            private_key_password: String::new(),
            min_adaptable_fee_per_gas: 1_000_000_000,
            max_total_fee_per_gas: Some(0),
            adaptable_fee_increase_factor: 1.101,
            blocks_until_resubmission: 10,
        }
    }

    const SAMPLE: &str = r#"
[node]
protocol = "0.3.0"

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[chains.polygon]
provider = "https://polygon.example/v1/${RELAY_NODE_TEST_KEY}"
fallback_providers = ["https://polygon-fallback.example"]
average_block_time = 2
confirmations = 3
chain_id = 137
hub = "0x1000000000000000000000000000000000000001"
forwarder = "0x2000000000000000000000000000000000000002"
token = "0x3000000000000000000000000000000000000003"
private_key = "keystore.json"
min_adaptable_fee_per_gas = 1000000000
max_total_fee_per_gas = 0
adaptable_fee_increase_factor = 1.101
blocks_until_resubmission = 10

[chains.solana]
active = false
provider = "https://solana.example"
average_block_time = 1
confirmations = 1
chain_id = 0
hub = ""
forwarder = ""
token = ""
private_key = ""
min_adaptable_fee_per_gas = 0
adaptable_fee_increase_factor = 1.5
blocks_until_resubmission = 1
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_sample_config() {
        env::set_var("RELAY_NODE_TEST_KEY", "abc123");
        let file = write_config(SAMPLE);
        let settings = Settings::load_from(file.path()).unwrap();

        assert_eq!(settings.node.health_flush_interval_secs, 60);
        assert!(settings.database.is_none());
        let active = settings.active_chains();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, Blockchain::Polygon);
        assert_eq!(
            active[0].1.provider,
            "https://polygon.example/v1/abc123"
        );
        assert_eq!(active[0].1.provider_timeout_secs, 10);

        let nodes = settings.rpc_nodes();
        assert_eq!(nodes[&Blockchain::Polygon].len(), 2);
        assert_eq!(nodes[&Blockchain::Solana].len(), 1);
    }

    #[test]
    fn test_zero_fee_cap_means_uncapped() {
        let policy = sample_chain_config().fee_policy();
        assert_eq!(policy.max_total_fee_per_gas, None);
    }

    #[test]
    fn test_unsupported_protocol_rejected() {
        let file = write_config(&SAMPLE.replace("0.3.0", "9.0.0"));
        assert!(Settings::load_from(file.path()).is_err());
    }

    #[test]
    fn test_sub_second_block_time() {
        let file = write_config(&SAMPLE.replace("average_block_time = 2\n", "average_block_time = 0.5\n"));
        let settings = Settings::load_from(file.path()).unwrap();

        let polygon = settings.chain(Blockchain::Polygon).unwrap();
        assert_eq!(polygon.average_block_time(), Duration::from_millis(500));
    }

    #[test]
    fn test_non_positive_block_time_rejected() {
        let file = write_config(&SAMPLE.replace("average_block_time = 2\n", "average_block_time = 0\n"));
        assert!(Settings::load_from(file.path()).is_err());
    }

    #[test]
    fn test_non_escalating_factor_rejected() {
        let file = write_config(&SAMPLE.replace("adaptable_fee_increase_factor = 1.101", "adaptable_fee_increase_factor = 1.0"));
        assert!(Settings::load_from(file.path()).is_err());
    }
}
