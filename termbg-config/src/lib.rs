use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use termbg_common::{TermbgError, error::ConfigError, Result};

mod store;

pub use store::ConfigStore;

pub const DEFAULT_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_OVERLAY_COLOR: &str = "rgba(0, 0, 0, .7)";
pub const DEFAULT_BLUR: &str = "0px";
pub const DEFAULT_SWITCH_KEY: &str = "CmdOrCtrl+Shift+S";
pub const DEFAULT_PROFILE: &str = "default";

/// The whole settings tree. Only `backgroundImage` is interpreted; every
/// other key belongs to the host and is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "backgroundImage", default)]
    pub background_image: BackgroundImageConfig,
    #[serde(flatten)]
    pub host: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackgroundImageConfig {
    #[serde(default = "default_profile_name")]
    pub default: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub path: Option<String>,
    /// Seconds between rotations. Kept raw so a bad value can be corrected
    /// instead of rejecting the whole file.
    #[serde(default)]
    pub interval: Option<Value>,
    #[serde(default)]
    pub fade: Option<bool>,
    #[serde(default)]
    pub overlay_color: Option<String>,
    #[serde(default)]
    pub blur: Option<String>,
    #[serde(default)]
    pub switch_background_key: Option<String>,
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for BackgroundImageConfig {
    fn default() -> Self {
        Self {
            default: default_profile_name(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Profile {
    /// Image source, `None` when unset or blank.
    pub fn source(&self) -> Option<&Path> {
        self.path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Path::new)
    }

    pub fn interval_secs(&self) -> Result<u64> {
        let Some(value) = &self.interval else {
            return Ok(DEFAULT_INTERVAL_SECS);
        };

        let secs = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u64)
            }),
            _ => None,
        };

        match secs {
            Some(secs) if secs >= 1 => Ok(secs),
            _ => Err(TermbgError::Config(ConfigError::InvalidValue {
                field: "interval".to_string(),
                value: value.to_string(),
            })),
        }
    }

    /// Rotation period; invalid intervals fall back to the default.
    pub fn effective_interval(&self) -> Duration {
        match self.interval_secs() {
            Ok(secs) => Duration::from_secs(secs),
            Err(e) => {
                log::warn!("{}, falling back to {}s", e, DEFAULT_INTERVAL_SECS);
                Duration::from_secs(DEFAULT_INTERVAL_SECS)
            }
        }
    }

    pub fn fade_enabled(&self) -> bool {
        self.fade != Some(false)
    }

    pub fn opacity_delay(&self) -> &'static str {
        if self.fade_enabled() { "0.4s" } else { "0s" }
    }

    pub fn overlay_color(&self) -> &str {
        self.overlay_color.as_deref().unwrap_or(DEFAULT_OVERLAY_COLOR)
    }

    pub fn blur(&self) -> &str {
        self.blur.as_deref().unwrap_or(DEFAULT_BLUR)
    }

    pub fn switch_background_key(&self) -> &str {
        self.switch_background_key.as_deref().unwrap_or(DEFAULT_SWITCH_KEY)
    }
}

impl BackgroundImageConfig {
    pub fn active_profile(&self) -> Result<&Profile> {
        self.profiles.get(&self.default).ok_or_else(|| {
            TermbgError::Config(ConfigError::UnknownProfile {
                name: self.default.clone(),
            })
        })
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TermbgError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "File not found"),
            }));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| TermbgError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }))?;

        let config: Config = toml::from_str(&content)?;

        for warning in config.diagnostics() {
            log::warn!("{:?}: {}", path, warning);
        }
        log::info!(
            "Loaded {} background profile(s) from {:?}, default '{}'",
            config.background_image.profiles.len(),
            path,
            config.background_image.default
        );

        Ok(config)
    }

    /// `$TERMBG_CONFIG`, else `termbg/config.toml` in the config directory.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os("TERMBG_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TermbgError::Config(ConfigError::NoConfigDir))?
            .join("termbg");

        Ok(config_dir.join("config.toml"))
    }

    /// Problems that are tolerated at load time and corrected at use.
    pub fn diagnostics(&self) -> Vec<String> {
        let background = &self.background_image;
        let mut warnings = Vec::new();

        if background.profiles.is_empty() {
            warnings.push("no background profiles defined".to_string());
        } else if !background.profiles.contains_key(&background.default) {
            warnings.push(format!("default profile '{}' is not defined", background.default));
        }

        for (name, profile) in &background.profiles {
            if let Err(e) = profile.interval_secs() {
                warnings.push(format!("profile '{}': {}", name, e));
            }
        }

        warnings
    }
}
