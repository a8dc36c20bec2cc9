use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, StalkgenError};

pub const DEFAULT_ENDPOINT: &str = "https://visual.volcengineapi.com/";
pub const DEFAULT_REGION: &str = "cn-north-1";
pub const DEFAULT_SERVICE: &str = "cv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

/// Credentials and tuning for the Volcengine visual API.
#[derive(Clone)]
pub struct VolcengineConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: String,
    pub region: String,
    pub service: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

// Keeps key material out of `{:?}` output.
impl fmt::Debug for VolcengineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolcengineConfig")
            .field("access_key_present", &self.has_access_key())
            .field("secret_key_present", &self.has_secret_key())
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

impl Default for VolcengineConfig {
    fn default() -> Self {
        VolcengineConfig {
            access_key: None,
            secret_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            timeout: Duration::from_millis(30_000),
            poll_interval: Duration::from_millis(2_000),
            max_poll_attempts: 60,
        }
    }
}

impl VolcengineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let access_key = first_env(&["SEEDREAM_API_AK", "VOLCENGINE_API_AK"]);
        let secret_key = first_env(&["SEEDREAM_API_SK", "VOLCENGINE_API_SK"]);
        let endpoint = env::var("VOLCENGINE_ENDPOINT").unwrap_or(defaults.endpoint);
        let region = env::var("VOLCENGINE_REGION").unwrap_or(defaults.region);
        let service = env::var("VOLCENGINE_SERVICE").unwrap_or(defaults.service);
        let timeout = env_parse::<u64>("VOLCENGINE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);
        let poll_interval = env_parse::<u64>("VOLCENGINE_POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let max_poll_attempts =
            env_parse("VOLCENGINE_MAX_POLL_ATTEMPTS").unwrap_or(defaults.max_poll_attempts);

        VolcengineConfig {
            access_key,
            secret_key,
            endpoint,
            region,
            service,
            timeout,
            poll_interval,
            max_poll_attempts,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    pub fn has_access_key(&self) -> bool {
        self.access_key.as_deref().map_or(false, |k| !k.is_empty())
    }

    pub fn has_secret_key(&self) -> bool {
        self.secret_key.as_deref().map_or(false, |k| !k.is_empty())
    }

    pub fn has_credentials(&self) -> bool {
        self.has_access_key() && self.has_secret_key()
    }

    /// Checks the knobs that would make the poll loop or transport nonsensical.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(StalkgenError::Config("Volcengine endpoint is empty".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(StalkgenError::Config(
                "VOLCENGINE_MAX_POLL_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(StalkgenError::Config(
                "VOLCENGINE_TIMEOUT_MS must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Bounds enforced on inbound generation requests.
#[derive(Debug, Clone)]
pub struct GenerationLimits {
    pub min_dimension: u32,
    pub max_dimension: u32,
    pub max_prompt_length: usize,
    pub max_images_per_request: u32,
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        GenerationLimits {
            min_dimension: 256,
            max_dimension: 4096,
            max_prompt_length: 2000,
            max_images_per_request: 15,
            default_width: 1024,
            default_height: 1024,
        }
    }
}

impl GenerationLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_prompt_length(mut self, max: usize) -> Self {
        self.max_prompt_length = max;
        self
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Creator {
    pub address: String,
    pub verified: bool,
    pub share: u8,
}

#[derive(Debug, Clone)]
pub struct NftMetadataConfig {
    pub name_prefix: String,
    pub external_url: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
}

impl Default for NftMetadataConfig {
    fn default() -> Self {
        NftMetadataConfig {
            name_prefix: "StalkGen Meme".to_string(),
            external_url: "https://github.com/solana-labs/solana".to_string(),
            seller_fee_basis_points: 500,
            creators: vec![Creator {
                address: "Helius1234567890".to_string(),
                verified: false,
                share: 100,
            }],
        }
    }
}

impl NftMetadataConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("NFT_EXTERNAL_URL") {
            config.external_url = url;
        }
        if let Some(fee) = env_parse("NFT_SELLER_FEE_BASIS_POINTS") {
            config.seller_fee_basis_points = fee;
        }
        if let Ok(address) = env::var("NFT_CREATOR_ADDRESS") {
            config.creators = vec![Creator {
                address,
                verified: false,
                share: 100,
            }];
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
    pub volcengine: VolcengineConfig,
    pub limits: GenerationLimits,
    pub nft: NftMetadataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3005,
            environment: Environment::Development,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3005".to_string(),
            ],
            volcengine: VolcengineConfig::default(),
            limits: GenerationLimits::default(),
            nft: NftMetadataConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = env_parse("PORT").unwrap_or(defaults.port);
        let host = env::var("HOST").unwrap_or(defaults.host);
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(defaults.environment);

        let mut allowed_origins = defaults.allowed_origins;
        for key in ["FRONTEND_URL", "NEXT_PUBLIC_FRONTEND_URL"] {
            if let Ok(origin) = env::var(key) {
                if !origin.is_empty() {
                    allowed_origins.push(origin);
                }
            }
        }

        Config {
            host,
            port,
            environment,
            allowed_origins,
            volcengine: VolcengineConfig::from_env(),
            limits: GenerationLimits::default(),
            nft: NftMetadataConfig::from_env(),
        }
    }

    pub fn with_volcengine(mut self, config: VolcengineConfig) -> Self {
        self.volcengine = config;
        self
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
