use anyhow::Error;
use clap::Parser;
use serde::Deserialize;

/// Default window for a single DTMF digit collection.
pub const DEFAULT_DIGIT_TIMEOUT_MS: u64 = 8000;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(long)]
    pub conf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    #[serde(default)]
    pub ari: AriConfig,
    #[serde(default)]
    pub ivr: IvrConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
}

/// Connection settings for the Asterisk REST Interface.
///
/// `url` is the HTTP base of the ARI endpoint; the event WebSocket address
/// is derived from it. `app` is the Stasis application name registered when
/// the event socket connects.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AriConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub app: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IvrConfig {
    /// Prefix of every sound resource name, e.g. `custom` in `custom/he/district`.
    pub sounds_prefix: String,
    /// How long a collecting step waits for a digit before the session aborts.
    pub digit_timeout_ms: u64,
}

/// The marketplace backend used to match workers against collected answers.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LookupConfig {
    pub url: String,
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8088".to_string(),
            username: "asterisk".to_string(),
            password: "asterisk".to_string(),
            app: "handyline".to_string(),
        }
    }
}

impl Default for IvrConfig {
    fn default() -> Self {
        Self {
            sounds_prefix: "custom".to_string(),
            digit_timeout_ms: DEFAULT_DIGIT_TIMEOUT_MS,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000/api/workers/match".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            ari: AriConfig::default(),
            ivr: IvrConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }
}
