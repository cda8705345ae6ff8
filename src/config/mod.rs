use crate::ifile::Mode;
use crate::utils;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Defaults applied to every watch entry unless overridden per entry.
    #[serde(default)]
    pub watch: WatchDefaults,

    #[serde(default)]
    pub backups: Vec<BackupConfig>,

    #[serde(default)]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchDefaults {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_fail_after_secs")]
    pub fail_after_secs: u64,
}

/// One backup entry: what to back up and where to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub name: String,

    /// Generate an include file and pass it via `--files-from` instead of
    /// naming each source path on the command line.
    #[serde(default = "default_true")]
    pub ifile_generation: bool,

    /// Absolute directory the source paths are resolved against.
    pub base: PathBuf,

    /// Source subpaths, relative to `base`.
    pub paths: Vec<PathBuf>,

    pub restic: ResticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResticConfig {
    /// Repository location, passed to `restic -r`.
    pub repo: String,

    /// Extra arguments spliced between the subcommand and the tail,
    /// shell-quoted as one string.
    #[serde(default)]
    pub extra_args: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Prefix the invocation with `sudo`.
    #[serde(default)]
    pub sudo: bool,
}

/// One watch entry: which tree keeps which ifile fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub name: String,
    pub ifile: PathBuf,
    pub scan_path: PathBuf,

    #[serde(default = "default_mode")]
    pub mode: Mode,

    #[serde(default)]
    pub debounce_ms: Option<u64>,
    #[serde(default)]
    pub fail_after_secs: Option<u64>,

    /// Shell command run before each walk; a non-zero exit aborts the walk.
    #[serde(default)]
    pub pre_hook: Option<String>,
    /// Shell command run after each walk.
    #[serde(default)]
    pub post_hook: Option<String>,
}

impl Default for WatchDefaults {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            fail_after_secs: default_fail_after_secs(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_fail_after_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_mode() -> Mode {
    Mode::Syncthing
}

impl Config {
    /// Load configuration from a file, creating a default one on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.expand_paths()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directories cannot be created, TOML
    /// serialisation fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Look up a backup entry by name.
    #[must_use]
    pub fn backup(&self, name: &str) -> Option<&BackupConfig> {
        self.backups.iter().find(|b| b.name == name)
    }

    fn expand_paths(&mut self) -> Result<()> {
        for backup in &mut self.backups {
            backup.base = utils::expand_tilde(&backup.base)?;
        }
        for watch in &mut self.watches {
            watch.ifile = utils::expand_tilde(&watch.ifile)?;
            watch.scan_path = utils::expand_tilde(&watch.scan_path)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for backup in &self.backups {
            if !names.insert(backup.name.as_str()) {
                anyhow::bail!("Duplicate backup name: {}", backup.name);
            }
            if !backup.base.is_absolute() {
                anyhow::bail!(
                    "Backup '{}': base must be an absolute path, got {}",
                    backup.name,
                    backup.base.display()
                );
            }
            if backup.paths.is_empty() {
                anyhow::bail!("Backup '{}': at least one source path is required", backup.name);
            }
            for path in &backup.paths {
                if path.is_absolute() {
                    anyhow::bail!(
                        "Backup '{}': source paths must be relative to base, got {}",
                        backup.name,
                        path.display()
                    );
                }
            }
            if backup.restic.repo.is_empty() {
                anyhow::bail!("Backup '{}': restic repository is required", backup.name);
            }
        }

        let mut watch_names = HashSet::new();
        for watch in &self.watches {
            if !watch_names.insert(watch.name.as_str()) {
                anyhow::bail!("Duplicate watch name: {}", watch.name);
            }
        }
        Ok(())
    }
}
