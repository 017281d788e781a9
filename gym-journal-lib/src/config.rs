//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;
use tracing::warn;

const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const APP_DIR: &str = "gym-journal";
const CONFIG_ENV_VAR: &str = "GYM_JOURNAL_CONFIG_DIR";

pub const DEFAULT_CATALOG_URL: &str = "https://wger.de/api/v2";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric, // kg
    Imperial, // lbs
}

impl Units {
    pub const fn weight_label(self) -> &'static str {
        match self {
            Self::Metric => "kg",
            Self::Imperial => "lbs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

/// Parses a color name case-insensitively ("darkgreen", "DarkGreen").
pub fn parse_color(color_str: &str) -> Result<StandardColor, Error> {
    StandardColor::iter()
        .find(|color| format!("{color:?}").eq_ignore_ascii_case(color_str))
        .ok_or_else(|| Error::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

impl Theme {
    /// Header color for tables, falling back to green on an unknown name.
    pub fn header(&self) -> Color {
        parse_color(&self.header_color).map_or(Color::Green, Color::from)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Catalog language id (2 = English on wger).
    pub language: u32,
    pub page_size: u32,
    /// Upper bound when following `next` links.
    pub max_pages: u32,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            language: 2,
            page_size: 100,
            max_pages: 50,
            timeout_secs: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    pub improvement_window_days: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            improvement_window_days: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub units: Units,
    /// Default tracing filter; `RUST_LOG` wins when set.
    pub log_level: String,
    pub catalog: CatalogConfig,
    pub stats: StatsConfig,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: Units::default(),
            log_level: "info".to_string(),
            catalog: CatalogConfig::default(),
            stats: StatsConfig::default(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Checks values that serde accepts but the app cannot use.
    pub fn validate(&self) -> Result<(), Error> {
        if self.catalog.page_size == 0 {
            return Err(Error::InvalidValue {
                field: "catalog.page_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.catalog.max_pages == 0 {
            return Err(Error::InvalidValue {
                field: "catalog.max_pages",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.catalog.timeout_secs == 0 {
            return Err(Error::InvalidValue {
                field: "catalog.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.stats.improvement_window_days == 0 {
            return Err(Error::InvalidValue {
                field: "stats.improvement_window_days",
                reason: "must be greater than zero".to_string(),
            });
        }
        parse_color(&self.theme.header_color)?;
        Ok(())
    }
}

/// Determines the path to the configuration file.
pub fn get_config_path() -> Result<PathBuf, Error> {
    let config_dir_path = if let Ok(path_str) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                "{CONFIG_ENV_VAR} points to '{}', which is not a directory. Trying to create it.",
                path.display()
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(Error::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration, writing a default file on first use.
pub fn load(config_path: &Path) -> Result<Config, Error> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save(config_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save(config_path: &Path, config: &Config) -> Result<(), Error> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config)?;
    fs::write(config_path, config_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str("units = \"imperial\"\n[catalog]\npage_size = 20\n").unwrap();
        assert_eq!(config.units, Units::Imperial);
        assert_eq!(config.catalog.page_size, 20);
        assert_eq!(config.catalog.base_url, DEFAULT_CATALOG_URL);
        assert_eq!(config.stats.improvement_window_days, 30);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.units, Units::Metric);

        let mut changed = config;
        changed.units = Units::Imperial;
        save(&path, &changed).unwrap();
        assert_eq!(load(&path).unwrap().units, Units::Imperial);
    }

    #[test]
    fn rejects_unusable_catalog_limits() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.catalog.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidValue { field: "catalog.timeout_secs", .. })
        ));

        let mut config = Config::default();
        config.catalog.max_pages = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidValue { field: "catalog.max_pages", .. })
        ));
    }

    #[test]
    fn rejects_zero_window_and_bad_color() {
        let mut config = Config::default();
        config.stats.improvement_window_days = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidValue { .. })));

        assert!(parse_color("darkcyan").is_ok());
        assert!(matches!(parse_color("plaid"), Err(Error::InvalidColor(_))));
    }
}
