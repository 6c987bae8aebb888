// src/config/relay.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::ingest::providers::reddit::DEFAULT_USER_AGENT;

pub const DEFAULT_RELAY_CONFIG_PATH: &str = "config/relay.toml";
pub const ENV_RELAY_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// The relay only runs when this is set (or RELAY_PRODUCTION=1).
    pub production: bool,
    pub authors_path: Option<PathBuf>,
    pub reddit: RedditCfg,
    pub dedup: DedupCfg,
    pub delivery: DeliveryCfg,
    pub tenants: Vec<TenantCfg>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RedditCfg {
    pub subreddit: String,
    pub user_agent: String,
    pub comments: StreamCfg,
    pub posts: StreamCfg,
}

impl Default for RedditCfg {
    fn default() -> Self {
        Self {
            subreddit: "2007scape".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            comments: StreamCfg {
                limit: 30,
                poll_ms: 15_000,
            },
            posts: StreamCfg {
                limit: 20,
                poll_ms: 60_000,
            },
        }
    }
}

/// Both keys are required when the table is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StreamCfg {
    pub limit: u32,
    pub poll_ms: u64,
}

impl StreamCfg {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DedupCfg {
    /// Most recent ids kept; 0 (the default) = never evict.
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeliveryCfg {
    pub timeout_ms: u64,
    pub max_concurrent: usize,
}

impl Default for DeliveryCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrent: 16,
        }
    }
}

impl DeliveryCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TenantCfg {
    pub id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl RelayConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing relay config toml")
    }

    /// Parse a file and apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// $RELAY_CONFIG_PATH (must exist), else config/relay.toml if present, else defaults.
    /// Env overrides apply in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_RELAY_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("RELAY_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from_file(pb);
        }
        let default_path = Path::new(DEFAULT_RELAY_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(default_path);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("RELAY_PRODUCTION") {
            self.production = parse_flag(&v)
                .ok_or_else(|| anyhow!("RELAY_PRODUCTION must be a boolean, got {v:?}"))?;
        }
        if let Some(v) = env_nonempty("RELAY_SUBREDDIT") {
            self.reddit.subreddit = v;
        }
        if let Some(v) = env_nonempty("RELAY_DEDUP_CAPACITY") {
            self.dedup.capacity = v
                .parse()
                .with_context(|| format!("RELAY_DEDUP_CAPACITY must be an integer, got {v:?}"))?;
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let cfg = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RelayConfig::default());
        assert!(!cfg.production);
        assert_eq!(cfg.reddit.comments.limit, 30);
        assert_eq!(cfg.reddit.posts.poll_interval(), Duration::from_secs(60));
        // Unbounded unless the file opts in.
        assert_eq!(cfg.dedup.capacity, 0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = RelayConfig::from_toml_str(
            r#"
production = true

[reddit]
subreddit = "runescape"

[reddit.posts]
limit = 5
poll_ms = 1000

[[tenants]]
id = "111"
channel_id = "900"

[[tenants]]
id = "222"
"#,
        )
        .unwrap();
        assert!(cfg.production);
        assert_eq!(cfg.reddit.subreddit, "runescape");
        assert_eq!(cfg.reddit.posts.limit, 5);
        assert_eq!(cfg.reddit.comments.poll_ms, 15_000);
        assert_eq!(cfg.dedup.capacity, 0);
        assert_eq!(cfg.tenants.len(), 2);
        assert_eq!(cfg.tenants[1].channel_id, None);
    }

    #[test]
    fn stream_tables_need_both_keys() {
        assert!(RelayConfig::from_toml_str("[reddit.comments]\nlimit = 3\n").is_err());
    }

    #[test]
    fn flags_parse() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
