use crate::commands::print_warning;
use crate::KopyatContext;
use anyhow::Result;
use colored::Colorize;
use which::which;

/// Execute the doctor command: report the configuration in use and check
/// that the backup binary is reachable.
///
/// # Errors
///
/// Returns an error if any check failed, so the process exits non-zero.
pub fn execute(ctx: &KopyatContext) -> Result<()> {
    let mut error_found = false;
    println!("{}", "Doctor:".bold());
    println!("    Using configuration file: {}", ctx.config_path.display());

    match which("restic") {
        Ok(path) => println!("    restic found at: {}", path.display()),
        Err(err) => {
            print_warning(&format!("restic not found: {err}"));
            error_found = true;
        }
    }

    for backup in &ctx.config.backups {
        if backup.restic.password.is_none() && std::env::var_os("RESTIC_PASSWORD").is_none() {
            print_warning(&format!(
                "Backup '{}': no password configured and RESTIC_PASSWORD is unset",
                backup.name
            ));
        }
    }

    if error_found {
        anyhow::bail!("Errors occurred.");
    }
    println!("{}", "All good.".green());
    Ok(())
}
