//! Subprocess wrapper around the restic binary.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::utils;

/// Builds and runs restic invocations for one repository.
///
/// The password never touches this process's environment: it is placed in
/// the child's environment block only, so drivers with different passwords
/// can run concurrently.
pub struct Restic {
    repo: String,
    extra_args: String,
    password: Option<String>,
    sudo: bool,
}

impl Restic {
    #[must_use]
    pub fn new(
        repo: impl Into<String>,
        extra_args: impl Into<String>,
        password: Option<String>,
        sudo: bool,
    ) -> Self {
        Self {
            repo: utils::to_slash(repo.into()),
            extra_args: extra_args.into(),
            password,
            sudo,
        }
    }

    /// The repository location this provider targets.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Whether a password will reach restic, either from the configuration
    /// or from the caller's environment.
    #[must_use]
    pub fn password_is_set(&self) -> bool {
        self.password.is_some() || std::env::var_os("RESTIC_PASSWORD").is_some()
    }

    /// Initialises the repository (`restic -r <repo> init`).
    ///
    /// # Errors
    ///
    /// Returns an error if restic cannot be spawned or exits non-zero.
    pub fn init(&self) -> Result<()> {
        self.run("init", &[])
    }

    /// Backs up a single path given positionally.
    ///
    /// # Errors
    ///
    /// Returns an error if restic cannot be spawned or exits non-zero.
    pub fn backup(&self, path: &Path) -> Result<()> {
        let path = utils::to_slash(path.to_string_lossy().into_owned());
        self.run("backup", &[&path])
    }

    /// Backs up the contents of an include file via `--files-from`.
    ///
    /// # Errors
    ///
    /// Returns an error if restic cannot be spawned or exits non-zero.
    pub fn backup_with_ifile(&self, ifile: &Path) -> Result<()> {
        let ifile = utils::to_slash(ifile.to_string_lossy().into_owned());
        self.run("backup", &["--files-from", &ifile])
    }

    /// Runs `restic -r <repo> <subcommand> [extra-args...] [tail...]` with
    /// inherited stdio.
    fn run(&self, subcommand: &str, tail: &[&str]) -> Result<()> {
        let mut args: Vec<String> = Vec::with_capacity(tail.len() + 8);
        args.push("-r".to_string());
        args.push(self.repo.clone());
        args.push(subcommand.to_string());
        if !self.extra_args.is_empty() {
            let extra = shell_words::split(&self.extra_args)
                .with_context(|| format!("Invalid extra arguments: '{}'", self.extra_args))?;
            args.extend(extra);
        }
        args.extend(tail.iter().map(|s| (*s).to_string()));

        let program = if self.sudo { "sudo" } else { "restic" };
        let mut cmd = Command::new(program);
        if self.sudo {
            cmd.arg("restic");
        }
        cmd.args(&args);
        if let Some(password) = &self.password {
            cmd.env("RESTIC_PASSWORD", password);
        }

        info!("Running: {} {}", program, shell_words::join(&args));
        let status = cmd
            .status()
            .with_context(|| format!("Failed to run {program}"))?;
        if !status.success() {
            anyhow::bail!("restic {subcommand} exited with {status}");
        }
        Ok(())
    }
}
