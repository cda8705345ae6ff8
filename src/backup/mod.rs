//! The backup driver: composes ifile generation with a restic invocation.

pub mod provider;

use crate::config::{BackupConfig, Config};
use crate::ifile::{Ifile, Mode};
use anyhow::{Context, Result};
use provider::Restic;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One runnable backup entry.
pub struct Backup {
    name: String,
    ifile_generation: bool,
    base: PathBuf,
    paths: Vec<PathBuf>,
    provider: Restic,
}

impl Backup {
    #[must_use]
    pub fn from_config(cfg: &BackupConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            ifile_generation: cfg.ifile_generation,
            base: cfg.base.clone(),
            paths: cfg.paths.clone(),
            provider: Restic::new(
                cfg.restic.repo.clone(),
                cfg.restic.extra_args.clone(),
                cfg.restic.password.clone(),
                cfg.restic.sudo,
            ),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &Restic {
        &self.provider
    }

    /// Initialises the target repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the restic invocation fails.
    pub fn init_repo(&self) -> Result<()> {
        self.provider.init()
    }

    /// Runs the backup.
    ///
    /// With ifile generation enabled, every source subpath is walked into
    /// one include file which restic then consumes via `--files-from`;
    /// otherwise each subpath is handed to restic positionally.
    ///
    /// # Errors
    ///
    /// Returns an error if ifile generation or the restic invocation fails.
    pub fn run(&self) -> Result<()> {
        info!(backup = %self.name, "starting backup");
        if self.ifile_generation {
            let ifile_path = self.ifile_path()?;
            let ifile = Ifile::new(&ifile_path, Mode::Restic);
            for path in &self.paths {
                let root = self.base.join(path);
                ifile
                    .walk(&root)
                    .with_context(|| format!("Failed to walk {}", root.display()))?;
            }
            ifile.write().context("Failed to write include file")?;
            debug!(ifile = %ifile_path.display(), "include file generated");
            self.provider.backup_with_ifile(&ifile_path)
        } else {
            for path in &self.paths {
                self.provider.backup(&self.base.join(path))?;
            }
            Ok(())
        }
    }

    /// Where this entry's generated include file lives.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined or
    /// created.
    pub fn ifile_path(&self) -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .context("Could not find cache directory")?
            .join("kopyat");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir.join(format!("{}.ifile", self.name)))
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }
}

/// Builds every configured backup, preserving declaration order.
#[must_use]
pub fn from_config(config: &Config) -> Vec<Backup> {
    config.backups.iter().map(Backup::from_config).collect()
}
