//! Configuration loading from an optional TOML file plus environment.
//!
//! Tuning values may live in `sweeper.toml`; every value can be overridden
//! from the environment, which is the primary source in deployment.
//! Secrets (signing key, notifier token) are read from the environment only
//! and held as `SecretString`.
//!
//! Legacy variable names from earlier deployments are accepted as fallbacks.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::rpc::DEFAULT_RPC_ENDPOINT;
use crate::engine::fee::{FeeConfig, FeeMode};
use crate::types::SuiAddress;

/// Default config file looked up when `SWEEPER_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "sweeper.toml";

// Environment keys: primary name first, legacy fallbacks after.
const ENV_SIGNING_KEY: &[&str] = &["SIGNING_KEY", "SUI_PRIVATE_KEY"];
const ENV_DESTINATION: &[&str] = &["DESTINATION_ADDRESS", "SUI_TARGET_ADDRESS"];
const ENV_RPC_ENDPOINT: &[&str] = &["RPC_ENDPOINT", "RPC_URL"];
const ENV_NOTIFY_TARGET: &[&str] = &["NOTIFY_TARGET", "DISCORD_CHANNEL_ID"];
const ENV_NOTIFY_TOKEN: &[&str] = &["NOTIFY_TOKEN", "DISCORD_TOKEN"];

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub rpc: RpcConfig,
    pub fees: FeesConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub destination_address: Option<String>,
    pub poll_interval_ms: u64,
    pub cooldown_ms: u64,
    /// Transaction explorer prefix; the digest is appended.
    pub explorer_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "SWEEPER-001".to_string(),
            destination_address: None,
            poll_interval_ms: 1_000,
            cooldown_ms: 5_000,
            explorer_url: "https://suiscan.xyz/mainnet/tx/".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_coin_pages: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC_ENDPOINT.to_string(),
            timeout_secs: 10,
            max_coin_pages: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeesConfig {
    pub mode: FeeMode,
    pub reserve: u64,
    pub gas_budget: u64,
    pub gas_per_coin: u64,
    pub min_sweep: u64,
}

impl Default for FeesConfig {
    fn default() -> Self {
        let d = FeeConfig::default();
        Self {
            mode: d.mode,
            reserve: d.reserve,
            gas_budget: d.min_gas,
            gas_per_coin: d.gas_per_coin,
            min_sweep: d.min_sweep,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    /// Discord channel id. No channel means log-only alerts.
    pub channel_id: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            request_timeout_secs: 5,
            connect_timeout_secs: 30,
        }
    }
}

/// Secrets pulled from the environment.
pub struct Credentials {
    pub signing_key: SecretString,
    pub notify_token: Option<SecretString>,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let signing_key = first_of(&lookup, ENV_SIGNING_KEY)
            .with_context(|| format!("Environment variable not set: {}", ENV_SIGNING_KEY[0]))?;
        Ok(Self {
            signing_key: SecretString::new(signing_key),
            notify_token: first_of(&lookup, ENV_NOTIFY_TOKEN).map(SecretString::new),
        })
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults if it does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load the file named by `SWEEPER_CONFIG` (or the default) and apply
    /// environment overrides.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("SWEEPER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut cfg = Self::load(&path)?;
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Override fields from an environment lookup.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> Result<()> {
        if let Some(v) = first_of(&lookup, ENV_DESTINATION) {
            self.agent.destination_address = Some(v);
        }
        if let Some(v) = first_of(&lookup, ENV_RPC_ENDPOINT) {
            self.rpc.endpoint = v;
        }
        if let Some(v) = first_of(&lookup, ENV_NOTIFY_TARGET) {
            self.notify.channel_id = Some(v);
        }
        if let Some(v) = lookup("EXPLORER_URL") {
            self.agent.explorer_url = v;
        }
        if let Some(v) = lookup("SWEEP_FEE_MODE") {
            self.fees.mode = v.parse()?;
        }

        parse_into(&lookup, "SWEEP_RESERVE", &mut self.fees.reserve)?;
        parse_into(&lookup, "SWEEP_GAS_BUDGET", &mut self.fees.gas_budget)?;
        parse_into(&lookup, "SWEEP_GAS_PER_COIN", &mut self.fees.gas_per_coin)?;
        parse_into(&lookup, "SWEEP_MIN_AMOUNT", &mut self.fees.min_sweep)?;
        parse_into(&lookup, "POLL_INTERVAL_MS", &mut self.agent.poll_interval_ms)?;
        parse_into(&lookup, "COOLDOWN_MS", &mut self.agent.cooldown_ms)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.poll_interval_ms == 0 {
            bail!("poll interval must be positive");
        }
        if self.rpc.endpoint.trim().is_empty() {
            bail!("RPC endpoint must not be empty");
        }
        self.destination()?;
        Ok(())
    }

    /// The sweep destination; required.
    pub fn destination(&self) -> Result<SuiAddress> {
        let raw = self
            .agent
            .destination_address
            .as_deref()
            .with_context(|| format!("Destination not set: {}", ENV_DESTINATION[0]))?;
        raw.parse::<SuiAddress>()
            .with_context(|| format!("Invalid destination address: {raw}"))
    }

    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            mode: self.fees.mode,
            reserve: self.fees.reserve,
            min_gas: self.fees.gas_budget,
            gas_per_coin: self.fees.gas_per_coin,
            min_sweep: self.fees.min_sweep,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.agent.poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.agent.cooldown_ms)
    }
}

fn first_of<F: Fn(&str) -> Option<String>>(lookup: &F, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(k))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {raw:?} ({e})"))?;
    }
    Ok(())
}
