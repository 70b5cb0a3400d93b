use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: Logging,
    pub loader: LoaderCfg,
    pub sync: SyncCfg,
    pub render: RenderCfg,
    pub input: InputCfg,
}

impl Config {
    pub fn load(path_opt: Option<&Path>) -> Result<Self> {
        let default_path = Path::new("config.toml");
        let path = if let Some(p) = path_opt {
            Some(p)
        } else if default_path.exists() {
            Some(default_path)
        } else {
            None
        };

        let mut cfg = Config::default();

        if let Some(path) = path {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            cfg = Self::from_toml(&raw)
                .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        }

        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml_pretty(&self) -> Result<String> {
        let s = toml::to_string_pretty(self).context("failed serializing config as TOML")?;
        Ok(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: String,
    pub debug_message_samples: usize,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            debug_message_samples: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderCfg {
    /// Fail the whole load on a malformed row instead of skipping it.
    pub strict_rows: bool,
}

impl Default for LoaderCfg {
    fn default() -> Self {
        Self { strict_rows: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncCfg {
    pub max_messages: usize,
    pub throttle_ms: u64,
    /// After a backward seek, start the cursor `max_messages` before the new
    /// position so the window is rebuilt instead of starting empty.
    pub prefill_on_seek: bool,
    pub frame_ms: u64,
}

impl Default for SyncCfg {
    fn default() -> Self {
        Self {
            max_messages: 60,
            throttle_ms: 40,
            prefill_on_seek: true,
            frame_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCfg {
    pub retention: usize,
    pub league: String,
    pub muted_users: Vec<String>,
    pub wrap_width: usize,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            retention: 60,
            league: "default".to_string(),
            muted_users: Vec::new(),
            wrap_width: 72,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCfg {
    pub small_step_ms: u64,
    pub large_step_ms: u64,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            small_step_ms: 5_000,
            large_step_ms: 60_000,
        }
    }
}

pub fn init_tracing(logging: &Logging, cli_override_level: Option<&str>) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = cli_override_level.unwrap_or(logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let is_json = logging.format.to_lowercase() == "json";

    // Chat output goes to stdout, so logs stay on stderr.
    if is_json {
        fmt()
            .with_env_filter(filter)
            .event_format(fmt::format().json())
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .pretty()
            .init();
    }

    tracing::info!(
        level = level,
        format = logging.format.as_str(),
        "logging initialized"
    );

    Ok(())
}
