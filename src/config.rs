//! Client configuration, per-call options and the network table.
//!
//! Option values are layered: a value given at the call site wins over the
//! configured value, which wins over the library default. The merge is done by
//! the pure `resolve` functions, so the precedence can be tested without I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{CHUNK_BYTE_SIZE, DEFAULT_HASH_FUNCTION_ID, MAX_FILE_SIZE, ZERO_ADDRESS};
use crate::error::{ConfigError, ConfigResult};
use crate::node::RetryPolicy;
use crate::rdf::InputFormat;
use crate::rdf::canon::DEFAULT_WORK_LIMIT;

pub const DEFAULT_ENDPOINT: &str = "http://localhost";
pub const DEFAULT_PORT: u16 = 8900;
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_NUMBER_OF_RETRIES: u32 = 5;
pub const DEFAULT_FREQUENCY_SECS: u64 = 5;
pub const DEFAULT_EPOCHS: u64 = 2;
pub const DEFAULT_REPLICATION_FACTOR: u32 = 3;
pub const DEFAULT_FINALIZATION_CONFIRMATIONS: u32 = 3;
pub const DEFAULT_PROXIMITY_SCORE_FUNCTIONS_PAIR_ID: u8 = 2;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Deployment environment a client talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Devnet,
    Testnet,
    #[default]
    Mainnet,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Devnet => "devnet",
            Environment::Testnet => "testnet",
            Environment::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "devnet" => Ok(Environment::Devnet),
            "testnet" => Ok(Environment::Testnet),
            "mainnet" => Ok(Environment::Mainnet),
            _ => Err(ConfigError::UnknownEnvironment { name: s.to_string() }),
        }
    }
}

/// Serialization of assertions returned by `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "JSON-LD", alias = "jsonld", alias = "json-ld")]
    JsonLd,
    #[serde(rename = "N-Quads", alias = "nquads", alias = "n-quads")]
    NQuads,
}

/// Which part of a knowledge collection `get` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Public,
    Private,
    #[default]
    All,
}

// ---------------------------------------------------------------------------
// Per-call options
// ---------------------------------------------------------------------------

/// Polling options. `None` means "not set at this layer".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number_of_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_secs: Option<u64>,
}

impl PollOptions {
    pub fn resolve(&self, configured: &PollOptions) -> RetryPolicy {
        RetryPolicy {
            max_retries: self
                .max_number_of_retries
                .or(configured.max_number_of_retries)
                .unwrap_or(DEFAULT_MAX_NUMBER_OF_RETRIES),
            frequency: Duration::from_secs(
                self.frequency_secs
                    .or(configured.frequency_secs)
                    .unwrap_or(DEFAULT_FREQUENCY_SECS),
            ),
        }
    }
}

/// Options for publishing a knowledge collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_function_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalization_confirmations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    /// Passed through to the chain untouched; no bidding is done here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<String>,
}

/// Fully resolved publish settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub epochs: u64,
    pub replication_factor: u32,
    pub hash_function_id: u8,
    pub finalization_confirmations: u32,
    pub immutable: bool,
    pub token_amount: Option<u128>,
    pub paymaster: String,
}

impl PublishOptions {
    pub fn resolve(&self, configured: &PublishOptions) -> PublishSettings {
        PublishSettings {
            epochs: self.epochs.or(configured.epochs).unwrap_or(DEFAULT_EPOCHS),
            replication_factor: self
                .replication_factor
                .or(configured.replication_factor)
                .unwrap_or(DEFAULT_REPLICATION_FACTOR),
            hash_function_id: self
                .hash_function_id
                .or(configured.hash_function_id)
                .unwrap_or(DEFAULT_HASH_FUNCTION_ID),
            finalization_confirmations: self
                .finalization_confirmations
                .or(configured.finalization_confirmations)
                .unwrap_or(DEFAULT_FINALIZATION_CONFIRMATIONS),
            immutable: self.immutable.or(configured.immutable).unwrap_or(false),
            token_amount: self.token_amount.or(configured.token_amount),
            paymaster: self
                .paymaster
                .clone()
                .or_else(|| configured.paymaster.clone())
                .unwrap_or_else(|| ZERO_ADDRESS.to_string()),
        }
    }
}

/// Options for retrieving a knowledge collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GetOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_function_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paranet_ual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ual: Option<bool>,
}

/// Fully resolved get settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSettings {
    pub validate: bool,
    pub output_format: OutputFormat,
    pub content_type: ContentType,
    pub include_metadata: bool,
    pub hash_function_id: u8,
    pub paranet_ual: Option<String>,
    pub subject_ual: bool,
}

impl GetOptions {
    pub fn resolve(&self, configured: &GetOptions) -> GetSettings {
        GetSettings {
            validate: self.validate.or(configured.validate).unwrap_or(true),
            output_format: self
                .output_format
                .or(configured.output_format)
                .unwrap_or_default(),
            content_type: self
                .content_type
                .or(configured.content_type)
                .unwrap_or_default(),
            include_metadata: self
                .include_metadata
                .or(configured.include_metadata)
                .unwrap_or(false),
            hash_function_id: self
                .hash_function_id
                .or(configured.hash_function_id)
                .unwrap_or(DEFAULT_HASH_FUNCTION_ID),
            paranet_ual: self
                .paranet_ual
                .clone()
                .or_else(|| configured.paranet_ual.clone()),
            subject_ual: self.subject_ual.or(configured.subject_ual).unwrap_or(false),
        }
    }
}

/// Options for a SPARQL query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paranet_ual: Option<String>,
}

impl QueryOptions {
    /// Call-site values over configured ones. There are no library defaults.
    pub fn resolve(&self, configured: &QueryOptions) -> QueryOptions {
        QueryOptions {
            repository: self
                .repository
                .clone()
                .or_else(|| configured.repository.clone()),
            paranet_ual: self
                .paranet_ual
                .clone()
                .or_else(|| configured.paranet_ual.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Storage node connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub endpoint: String,
    pub port: u16,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            port: DEFAULT_PORT,
            api_version: DEFAULT_API_VERSION.into(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NodeConfig {
    /// `{endpoint}:{port}/{api_version}`.
    pub fn base_url(&self) -> String {
        format!(
            "{}:{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.port,
            self.api_version
        )
    }
}

/// Dataset limits and input handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    pub input_format: InputFormat,
    pub chunk_byte_size: usize,
    pub max_file_size: usize,
    /// Work budget for blank node canonicalization of symmetric datasets.
    pub canonicalization_work_limit: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input_format: InputFormat::JsonLd,
            chunk_byte_size: CHUNK_BYTE_SIZE,
            max_file_size: MAX_FILE_SIZE,
            canonicalization_work_limit: DEFAULT_WORK_LIMIT,
        }
    }
}

/// Client configuration, usually loaded from `dkg.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DkgConfig {
    pub environment: Environment,
    /// Blockchain id such as `base:8453`.
    pub blockchain: String,
    pub node: NodeConfig,
    pub dataset: DatasetConfig,
    pub polling: PollOptions,
    pub publish: PublishOptions,
    pub get: GetOptions,
    pub query: QueryOptions,
}

impl Default for DkgConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Mainnet,
            blockchain: "base:8453".into(),
            node: NodeConfig::default(),
            dataset: DatasetConfig::default(),
            polling: PollOptions::default(),
            publish: PublishOptions::default(),
            get: GetOptions::default(),
            query: QueryOptions::default(),
        }
    }
}

impl DkgConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Network table
// ---------------------------------------------------------------------------

/// Fixed parameters of one blockchain in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    /// Hub contract address, when the client ships one.
    pub hub: Option<String>,
    pub rpc: Option<String>,
    pub proximity_score_function_pair_id: u8,
}

impl NetworkParams {
    pub fn new(hub: Option<&str>, rpc: Option<&str>) -> Self {
        Self {
            hub: hub.map(str::to_string),
            rpc: rpc.map(str::to_string),
            proximity_score_function_pair_id: DEFAULT_PROXIMITY_SCORE_FUNCTIONS_PAIR_ID,
        }
    }
}

/// Immutable `(environment, blockchain id)` lookup of network parameters.
///
/// Built once and shared by reference. Tests inject their own entries with
/// [`NetworkTable::with_network`], which returns a new table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkTable {
    entries: BTreeMap<(Environment, String), NetworkParams>,
}

impl NetworkTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The networks known to this client release.
    pub fn builtin() -> Self {
        const HARDHAT_HUB: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
        const BASE_SEPOLIA_RPC: &str = "https://sepolia.base.org";

        Self::empty()
            .with_network(
                Environment::Development,
                "hardhat1:31337",
                NetworkParams::new(Some(HARDHAT_HUB), Some("http://localhost:8545")),
            )
            .with_network(
                Environment::Development,
                "hardhat2:31337",
                NetworkParams::new(Some(HARDHAT_HUB), Some("http://localhost:9545")),
            )
            .with_network(Environment::Development, "otp:2043", NetworkParams::new(None, None))
            .with_network(
                Environment::Devnet,
                "base:84532",
                NetworkParams::new(
                    Some("0xaA849CAC4FA86f6b7484503f3c7a314772AED6d4"),
                    Some(BASE_SEPOLIA_RPC),
                ),
            )
            .with_network(Environment::Devnet, "otp:2160", NetworkParams::new(None, None))
            .with_network(Environment::Devnet, "gnosis:10200", NetworkParams::new(None, None))
            .with_network(
                Environment::Testnet,
                "base:84532",
                NetworkParams::new(
                    Some("0xCca0eA14540588A09c85cD6A6Fc53eA3A7010692"),
                    Some(BASE_SEPOLIA_RPC),
                ),
            )
            .with_network(Environment::Testnet, "otp:20430", NetworkParams::new(None, None))
            .with_network(Environment::Testnet, "gnosis:10200", NetworkParams::new(None, None))
            .with_network(Environment::Mainnet, "otp:2043", NetworkParams::new(None, None))
            .with_network(Environment::Mainnet, "gnosis:100", NetworkParams::new(None, None))
            .with_network(Environment::Mainnet, "base:8453", NetworkParams::new(None, None))
    }

    /// A copy of this table with `params` registered (or replaced).
    pub fn with_network(
        mut self,
        environment: Environment,
        blockchain: impl Into<String>,
        params: NetworkParams,
    ) -> Self {
        self.entries.insert((environment, blockchain.into()), params);
        self
    }

    pub fn get(&self, environment: Environment, blockchain: &str) -> Option<&NetworkParams> {
        self.entries.get(&(environment, blockchain.to_string()))
    }

    pub fn require(&self, environment: Environment, blockchain: &str) -> ConfigResult<&NetworkParams> {
        self.get(environment, blockchain)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                environment: environment.to_string(),
                blockchain: blockchain.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_site_beats_configured_beats_default() {
        let configured = PublishOptions {
            epochs: Some(5),
            replication_factor: Some(4),
            ..Default::default()
        };
        let call = PublishOptions {
            epochs: Some(12),
            ..Default::default()
        };
        let settings = call.resolve(&configured);
        assert_eq!(settings.epochs, 12);
        assert_eq!(settings.replication_factor, 4);
        assert_eq!(settings.hash_function_id, DEFAULT_HASH_FUNCTION_ID);
        assert_eq!(settings.finalization_confirmations, DEFAULT_FINALIZATION_CONFIRMATIONS);
        assert!(!settings.immutable);
        assert_eq!(settings.paymaster, ZERO_ADDRESS);
    }

    #[test]
    fn poll_defaults() {
        let policy = PollOptions::default().resolve(&PollOptions::default());
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.frequency, Duration::from_secs(5));

        let policy = PollOptions {
            max_number_of_retries: Some(2),
            frequency_secs: None,
        }
        .resolve(&PollOptions {
            max_number_of_retries: Some(9),
            frequency_secs: Some(1),
        });
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.frequency, Duration::from_secs(1));
    }

    #[test]
    fn get_defaults() {
        let settings = GetOptions::default().resolve(&GetOptions::default());
        assert!(settings.validate);
        assert_eq!(settings.output_format, OutputFormat::JsonLd);
        assert_eq!(settings.content_type, ContentType::All);
        assert!(!settings.include_metadata);
    }

    #[test]
    fn base_url_joins_parts() {
        let node = NodeConfig {
            endpoint: "https://node.example/".into(),
            port: 8900,
            ..NodeConfig::default()
        };
        assert_eq!(node.base_url(), "https://node.example:8900/v1");
    }

    #[test]
    fn config_roundtrip_through_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/dkg.toml");
        let mut config = DkgConfig::default();
        config.environment = Environment::Testnet;
        config.blockchain = "base:84532".into();
        config.polling.max_number_of_retries = Some(7);
        config.dataset.input_format = InputFormat::NQuads;
        config.save(&path).unwrap();

        let loaded = DkgConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: DkgConfig = toml::from_str(
            "environment = \"devnet\"\n[node]\nport = 9000\n[get]\noutput_format = \"N-Quads\"\n",
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Devnet);
        assert_eq!(config.node.port, 9000);
        assert_eq!(config.node.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.get.output_format, Some(OutputFormat::NQuads));
        assert_eq!(config.dataset.chunk_byte_size, CHUNK_BYTE_SIZE);
    }

    #[test]
    fn canonicalization_work_limit_is_configurable() {
        let config: DkgConfig =
            toml::from_str("[dataset]\ncanonicalization_work_limit = 500\n").unwrap();
        assert_eq!(config.dataset.canonicalization_work_limit, 500);
        assert_eq!(
            DkgConfig::default().dataset.canonicalization_work_limit,
            DEFAULT_WORK_LIMIT
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<DkgConfig>("colour = \"blue\"\n").is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = DkgConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn builtin_table_lookups() {
        let table = NetworkTable::builtin();
        let testnet = table.require(Environment::Testnet, "base:84532").unwrap();
        assert_eq!(
            testnet.hub.as_deref(),
            Some("0xCca0eA14540588A09c85cD6A6Fc53eA3A7010692")
        );
        assert_eq!(testnet.proximity_score_function_pair_id, 2);
        assert!(matches!(
            table.require(Environment::Mainnet, "base:84532"),
            Err(ConfigError::UnknownNetwork { .. })
        ));
    }

    #[test]
    fn with_network_leaves_original_untouched() {
        let table = NetworkTable::builtin();
        let custom = table.clone().with_network(
            Environment::Development,
            "local:1",
            NetworkParams::new(Some("0x01"), None),
        );
        assert!(table.get(Environment::Development, "local:1").is_none());
        assert!(custom.get(Environment::Development, "local:1").is_some());
        assert_eq!(custom.len(), table.len() + 1);
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("Testnet".parse::<Environment>().unwrap(), Environment::Testnet);
        assert!(matches!(
            "staging".parse::<Environment>(),
            Err(ConfigError::UnknownEnvironment { .. })
        ));
    }
}
