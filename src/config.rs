//! Configuration management for the bundle minter
//!
//! Tunables are read from an optional TOML file with environment variable
//! substitution. Secrets and endpoints come from the process environment
//! (a `.env` file is honoured) and override whatever the file says.

use crate::error::{MinterError, MinterResult};

use ethers::signers::LocalWallet;
use ethers::types::{Address, U256};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const ENV_CONFIG_PATH: &str = "MINTER_CONFIG";
pub const ENV_WALLET_PRIVATE_KEY: &str = "WALLET_PRIVATE_KEY";
pub const ENV_CONTRACT: &str = "FAKE_NFT_CONTRACT";
pub const ENV_HTTP_PROVIDER: &str = "HTTP_PROVIDER";
pub const ENV_USE_GOERLI: &str = "USE_GOERLI";
pub const ENV_FLASHBOTS_SIGNER_KEY: &str = "FLASHBOTS_SIGNER_KEY";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern is valid");
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub relay: RelayConfig,
    pub gas: GasConfig,
    pub mint: MintConfig,
    pub bundle: BundleConfig,
    #[serde(skip)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub http_provider: String,
    /// Queried from the node when unset
    pub chain_id: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_provider: "http://localhost:8545".to_string(),
            chain_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mainnet_url: String,
    pub goerli_url: String,
    pub use_goerli: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mainnet_url: "https://relay.flashbots.net".to_string(),
            goerli_url: "https://relay-goerli.flashbots.net".to_string(),
            use_goerli: false,
        }
    }
}

impl RelayConfig {
    /// Relay endpoint selected by `use_goerli`
    pub fn endpoint(&self) -> &str {
        if self.use_goerli {
            &self.goerli_url
        } else {
            &self.mainnet_url
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub oracle_url: String,
    pub oracle_timeout_secs: u64,
    pub multiplier: u64,
    pub max_priority_fee_gwei: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            oracle_url: "https://ethgasstation.info/json/ethgasAPI.json".to_string(),
            oracle_timeout_secs: 10,
            multiplier: 3,
            max_priority_fee_gwei: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    pub contract_address: String,
    pub value_ether: String,
    pub selector: String,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            value_ether: "0.03".to_string(),
            selector: "0x1249c58b".to_string(),
        }
    }
}

impl MintConfig {
    pub fn contract(&self) -> MinterResult<Address> {
        self.contract_address.parse().map_err(|e| {
            MinterError::Config(format!(
                "Invalid contract address {:?}: {}",
                self.contract_address, e
            ))
        })
    }

    pub fn value_wei(&self) -> MinterResult<U256> {
        ethers::utils::parse_ether(&self.value_ether).map_err(|e| {
            MinterError::Config(format!("Invalid mint value {:?}: {}", self.value_ether, e))
        })
    }

    pub fn selector_bytes(&self) -> MinterResult<[u8; 4]> {
        let raw = self.selector.trim_start_matches("0x");
        let bytes = hex::decode(raw).map_err(|e| {
            MinterError::Config(format!("Invalid selector {:?}: {}", self.selector, e))
        })?;
        bytes.try_into().map_err(|_| {
            MinterError::Config(format!(
                "Selector {:?} must be exactly 4 bytes",
                self.selector
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Bundles are sent to blocks `current + 1 .. current + window_size`
    pub window_size: u64,
    pub max_blocks_ahead: u64,
    pub receipt_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            max_blocks_ahead: 3,
            receipt_timeout_ms: 1_000,
            receipt_poll_interval_ms: 100,
        }
    }
}

/// Key material, only ever taken from the environment
#[derive(Clone, Default)]
pub struct WalletConfig {
    pub private_key: String,
    pub flashbots_signer_key: Option<String>,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &"<redacted>")
            .field(
                "flashbots_signer_key",
                &self.flashbots_signer_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl WalletConfig {
    pub fn user_wallet(&self) -> MinterResult<LocalWallet> {
        self.private_key
            .parse::<LocalWallet>()
            .map_err(|e| MinterError::Config(format!("Invalid {}: {}", ENV_WALLET_PRIVATE_KEY, e)))
    }

    /// Relay identity; a fresh random one unless pinned
    pub fn flashbots_identity(&self) -> MinterResult<LocalWallet> {
        match &self.flashbots_signer_key {
            Some(key) => key.parse::<LocalWallet>().map_err(|e| {
                MinterError::Config(format!("Invalid {}: {}", ENV_FLASHBOTS_SIGNER_KEY, e))
            }),
            None => Ok(LocalWallet::new(&mut ethers::core::rand::thread_rng())),
        }
    }
}

impl Settings {
    /// Load settings from `.env`, the optional config file and the environment
    pub fn load() -> MinterResult<Self> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded variables from .env");
        }

        let config_str = match env::var(ENV_CONFIG_PATH) {
            Ok(path) => Some(read_config_file(&PathBuf::from(path))?),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Some(read_config_file(Path::new(DEFAULT_CONFIG_PATH))?)
            }
            Err(_) => None,
        };

        Self::from_sources(config_str.as_deref(), &|key| env::var(key).ok())
    }

    /// Build settings from config file contents and an environment lookup
    pub fn from_sources(
        config_str: Option<&str>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> MinterResult<Self> {
        let mut settings = match config_str {
            Some(raw) => {
                let substituted = substitute_env_vars(raw, lookup);
                toml::from_str::<Settings>(&substituted).map_err(|e| {
                    MinterError::Config(format!("Failed to parse configuration: {}", e))
                })?
            }
            None => Settings::default(),
        };

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_HTTP_PROVIDER) {
            settings.node.http_provider = url;
        }
        if let Some(flag) = lookup(ENV_USE_GOERLI) {
            settings.relay.use_goerli = parse_bool(&flag).ok_or_else(|| {
                MinterError::Config(format!("{} must be a boolean, got {:?}", ENV_USE_GOERLI, flag))
            })?;
        }
        if let Some(contract) = non_empty(ENV_CONTRACT) {
            settings.mint.contract_address = contract;
        }

        let private_key = non_empty(ENV_WALLET_PRIVATE_KEY);
        if private_key.is_none() || settings.mint.contract_address.trim().is_empty() {
            return Err(MinterError::Config(format!(
                "env variables {} and {} required",
                ENV_WALLET_PRIVATE_KEY, ENV_CONTRACT
            )));
        }
        settings.wallet = WalletConfig {
            private_key: private_key.unwrap_or_default(),
            flashbots_signer_key: non_empty(ENV_FLASHBOTS_SIGNER_KEY),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> MinterResult<()> {
        self.wallet.user_wallet()?;
        if let Some(key) = &self.wallet.flashbots_signer_key {
            key.parse::<LocalWallet>().map_err(|e| {
                MinterError::Config(format!("Invalid {}: {}", ENV_FLASHBOTS_SIGNER_KEY, e))
            })?;
        }
        self.mint.contract()?;
        self.mint.value_wei()?;
        self.mint.selector_bytes()?;

        if self.gas.multiplier == 0 {
            return Err(MinterError::Config("gas.multiplier must be positive".into()));
        }
        if self.bundle.window_size < 2 {
            return Err(MinterError::Config(format!(
                "bundle.window_size must be at least 2 to target any block, got {}",
                self.bundle.window_size
            )));
        }
        if self.bundle.receipt_timeout_ms == 0 {
            return Err(MinterError::Config(
                "bundle.receipt_timeout_ms must be positive".into(),
            ));
        }
        if self.node.http_provider.trim().is_empty() {
            return Err(MinterError::Config("node.http_provider is empty".into()));
        }
        if self.gas.max_priority_fee_gwei == 0 {
            warn!("gas.max_priority_fee_gwei is 0, builders have no tip to collect");
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> MinterResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        MinterError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })
}

/// Accepts the usual spellings; an empty value means false
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
