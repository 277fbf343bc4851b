//! Run configuration.
//!
//! A [`RunConfig`] is built once, either from command-line flags or from a
//! configuration file, and then handed to the application. Configuration
//! files may be JSON or YAML; the format is detected by attempting JSON first
//! and falling back to YAML. Scalar fields from a file can be overridden with
//! `DNSTT_HELPER_` prefixed environment variables.

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::Cli;
use crate::mtu::MTU_AUTO;
use crate::resolver::{ResolverKind, ResolverSpec};

/// Prefix for environment overrides of file-based configuration.
pub const ENV_PREFIX: &str = "DNSTT_HELPER_";

/// Overridable fields whose values are taken verbatim. Figment would
/// otherwise read `7000` or `0123...` as a number.
const TEXT_ENV_KEYS: [&str; 5] = ["domain", "local_addr", "pubkey", "pubkey_file", "mtu"];

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// MTU used when a configuration file leaves `mtu` empty. Flags default to
/// [`MTU_AUTO`] instead.
pub const DEFAULT_FILE_MTU: &str = "1232";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config (tried JSON and YAML): {yaml}")]
    Parse {
        json: serde_json::Error,
        yaml: serde_yml::Error,
    },

    #[error("invalid environment override: {0}")]
    Env(#[from] Box<figment::Error>),

    #[error("domain is required")]
    MissingDomain,

    #[error("local address is required")]
    MissingLocalAddr,

    #[error("public key is required (--pubkey or --pubkey-file)")]
    MissingPublicKey,

    #[error("at least one resolver is required")]
    NoResolvers,

    #[error("resolver {index} ({kind}) has no {field}")]
    IncompleteResolver {
        index: usize,
        kind: ResolverKind,
        field: &'static str,
    },
}

/// Where the tunnel client gets the server public key from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource<'a> {
    Inline(&'a str),
    File(&'a Path),
}

/// Everything needed to launch and supervise the tunnel client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunConfig {
    /// Tunnel domain.
    #[serde(default)]
    pub domain: String,
    /// Local address the tunnel client listens on.
    #[serde(default)]
    pub local_addr: String,
    /// Server public key, inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    /// Server public key, as a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey_file: Option<PathBuf>,
    /// Resolvers in preference order.
    #[serde(default)]
    pub resolvers: Vec<ResolverSpec>,
    /// `"auto"` or a numeric MTU.
    #[serde(default, deserialize_with = "deserialize_mtu")]
    pub mtu: String,
    /// Rotate to the next resolver after a failed run.
    #[serde(default)]
    pub failover: bool,
    /// Retries after the first attempt.
    #[serde(default)]
    pub retry_count: u32,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout: u64,
}

/// Defaults used when the configuration comes from flags.
impl Default for RunConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            local_addr: String::new(),
            pubkey: None,
            pubkey_file: None,
            resolvers: Vec::new(),
            mtu: MTU_AUTO.to_string(),
            failover: true,
            retry_count: DEFAULT_RETRY_COUNT,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RunConfig {
    /// Builds the configuration from whichever entry point the command line used.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        match &cli.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::from_cli(cli)),
        }
    }

    /// Loads a JSON or YAML configuration file, applies environment overrides
    /// and fills in defaults for empty fields.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = Self::parse(&data)?;
        let mut figment = Figment::from(Serialized::defaults(parsed))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&TEXT_ENV_KEYS));
        for (key, value) in Env::prefixed(ENV_PREFIX).only(&TEXT_ENV_KEYS).iter() {
            figment = figment.merge(Serialized::default(key.as_str(), value));
        }
        let mut config: RunConfig = figment.extract().map_err(Box::new)?;

        config.apply_file_defaults();
        Ok(config)
    }

    /// Parses configuration text, JSON first, then YAML. No defaults are applied.
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        match serde_json::from_str(data) {
            Ok(config) => Ok(config),
            Err(json) => serde_yml::from_str(data).map_err(|yaml| ConfigError::Parse { json, yaml }),
        }
    }

    fn apply_file_defaults(&mut self) {
        if self.retry_count == 0 {
            self.retry_count = DEFAULT_RETRY_COUNT;
        }
        if self.timeout == 0 {
            self.timeout = DEFAULT_TIMEOUT_SECS;
        }
        if self.mtu.is_empty() {
            self.mtu = DEFAULT_FILE_MTU.to_string();
        }
    }

    /// Builds the configuration from individual flags. Resolvers are added in
    /// udp, doh, dot order with priorities 1, 2 and 3.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = RunConfig {
            domain: cli.domain.clone().unwrap_or_default(),
            local_addr: cli.local_addr.clone().unwrap_or_default(),
            pubkey: cli.pubkey.clone(),
            pubkey_file: cli.pubkey_file.clone(),
            ..Default::default()
        };
        if let Some(mtu) = &cli.mtu {
            config.mtu = mtu.clone();
        }

        if let Some(addr) = &cli.udp {
            config.resolvers.push(ResolverSpec::udp(addr.clone(), 1));
        }
        if let Some(url) = &cli.doh {
            config.resolvers.push(ResolverSpec::doh(url.clone(), 2));
        }
        if let Some(addr) = &cli.dot {
            config.resolvers.push(ResolverSpec::dot(addr.clone(), 3));
        }

        config
    }

    /// Checks that the configuration is complete enough to launch the client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.is_empty() {
            return Err(ConfigError::MissingDomain);
        }
        if self.local_addr.is_empty() {
            return Err(ConfigError::MissingLocalAddr);
        }
        if self.key_source().is_none() {
            return Err(ConfigError::MissingPublicKey);
        }
        if self.resolvers.is_empty() {
            return Err(ConfigError::NoResolvers);
        }
        for (index, resolver) in self.resolvers.iter().enumerate() {
            if resolver.endpoint().is_empty() {
                let field = match resolver.kind {
                    ResolverKind::Doh => "url",
                    ResolverKind::Udp | ResolverKind::Dot => "addr",
                };
                return Err(ConfigError::IncompleteResolver {
                    index,
                    kind: resolver.kind,
                    field,
                });
            }
        }
        Ok(())
    }

    /// The key handed to the tunnel client. An inline key wins over a key file.
    pub fn key_source(&self) -> Option<KeySource<'_>> {
        if let Some(key) = self.pubkey.as_deref().filter(|k| !k.is_empty()) {
            return Some(KeySource::Inline(key));
        }
        self.pubkey_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(KeySource::File)
    }

    /// The currently preferred resolver.
    pub fn primary_resolver(&self) -> Option<&ResolverSpec> {
        self.resolvers.first()
    }
}

/// Accepts the MTU as either a string or a bare number.
fn deserialize_mtu<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MtuToken {
        Text(String),
        Number(u64),
    }

    Ok(match MtuToken::deserialize(deserializer)? {
        MtuToken::Text(text) => text,
        MtuToken::Number(n) => n.to_string(),
    })
}
