// src/lib.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// --- Declare modules ---
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod stats;
pub mod transfer;
pub mod usecase;
pub mod viewmodel;

// --- Expose public types ---
pub use catalog::CatalogClient;
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, Error as ConfigError, StandardColor, Theme, Units,
};
pub use db::{get_db_path as get_db_path_util, Error as DbError, Store};
pub use error::Error;
pub use models::*;
pub use usecase::{settle, Resource, ResultStream, SeedReport, UseCases};

/// Composition root: owns the configuration and wires the store and catalog
/// client into [`UseCases`].
pub struct AppService {
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    use_cases: UseCases,
}

impl AppService {
    /// Initializes the application service from the default locations.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let db_path = db::get_db_path().context("Failed to determine database path")?;
        Self::with_paths(config_path, db_path)
    }

    /// Like [`Self::initialize`] with explicit file locations.
    /// # Errors
    /// Returns `anyhow::Error` if the config cannot be loaded or the database
    /// cannot be opened and migrated.
    pub fn with_paths(config_path: PathBuf, db_path: PathBuf) -> Result<Self> {
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;
        let store = Store::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;
        let use_cases = build_use_cases(store, &config)?;

        Ok(Self {
            config,
            config_path,
            db_path,
            use_cases,
        })
    }

    pub const fn use_cases(&self) -> &UseCases {
        &self.use_cases
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    pub fn set_units(&mut self, units: Units) -> Result<(), ConfigError> {
        self.config.units = units;
        self.save_config()
    }

    /// Sets the table header color.
    /// # Errors
    /// - `ConfigError::InvalidColor` if the name is not a known color.
    /// - `ConfigError` variants if saving fails.
    pub fn set_header_color(&mut self, color: &str) -> Result<(), ConfigError> {
        let parsed = parse_color(color)?;
        self.config.theme.header_color = format!("{parsed:?}");
        self.save_config()
    }

    /// Sets the most-improved window and rebuilds the use cases with it.
    /// # Errors
    /// Returns an error for a zero window or if the config cannot be saved.
    pub fn set_improvement_window(&mut self, days: u32) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.stats.improvement_window_days = days;
        candidate.validate()?;
        let use_cases = build_use_cases(self.use_cases.store().clone(), &candidate)?;
        self.config = candidate;
        self.save_config()?;
        self.use_cases = use_cases;
        Ok(())
    }

    /// Points the catalog client at a different base URL.
    /// # Errors
    /// Returns an error if the URL is unusable or the config cannot be saved.
    pub fn set_catalog_url(&mut self, url: &str) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.catalog.base_url = url.trim().to_string();
        let use_cases = build_use_cases(self.use_cases.store().clone(), &candidate)?;
        self.config = candidate;
        self.save_config()?;
        self.use_cases = use_cases;
        Ok(())
    }
}

fn build_use_cases(store: Store, config: &Config) -> Result<UseCases> {
    let catalog = CatalogClient::new(&config.catalog).context("Failed to build catalog client")?;
    Ok(UseCases::new(
        store,
        catalog,
        config.stats.improvement_window_days,
    ))
}
