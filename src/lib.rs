pub mod backup;
pub mod commands;
pub mod config;
pub mod ifile;
pub mod utils;

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_CONFIG_PATH: &str = ".config/kopyat/config";

/// Everything a command needs: where the configuration came from and what it
/// said.
#[derive(Debug, Clone)]
pub struct KopyatContext {
    pub config_path: PathBuf,
    pub config: config::Config,
}

impl KopyatContext {
    /// Builds a context from the default configuration location, honouring a
    /// `KOPYAT_CONFIG` environment override.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// configuration fails to load.
    pub fn new() -> Result<Self> {
        let config_path = match std::env::var_os("KOPYAT_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = dirs::home_dir().context("Could not find home directory")?;
                home.join(DEFAULT_CONFIG_PATH)
            }
        };
        Self::new_explicit(config_path)
    }

    /// Builds a context from an explicit configuration path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails to load.
    pub fn new_explicit(config_path: PathBuf) -> Result<Self> {
        let config = config::Config::load(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }
}
