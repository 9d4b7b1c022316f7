use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";
pub const ENV_PREFIX: &str = "BINOPT_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config/Config.toml` and `BINOPT_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read, parsed or validated.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), None)
    }

    /// Loads `path`, then `Config.<profile>.toml` next to it, then the environment.
    ///
    /// Missing files are skipped; nested keys use `__` in variable names,
    /// e.g. `BINOPT_CHAIN__PRIVATE_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read, parsed or validated.
    pub fn load_from(path: &Path, profile: Option<&str>) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Toml::file(path));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(profile_path(path, profile)));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }
}

fn profile_path(base: &Path, profile: &str) -> PathBuf {
    base.with_file_name(format!("Config.{profile}.toml"))
}
