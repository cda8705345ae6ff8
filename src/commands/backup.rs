use crate::backup::{self, Backup};
use crate::commands::{print_info, print_success, print_warning};
use crate::KopyatContext;
use anyhow::{Context, Result};

/// Execute the backup command: one named entry, or all of them in
/// declaration order.
///
/// # Errors
///
/// Returns an error if a named backup does not exist or any selected backup
/// fails. Remaining entries are not attempted after a failure.
pub fn execute(ctx: &KopyatContext, name: Option<&str>, init: bool) -> Result<()> {
    let backups = backup::from_config(&ctx.config);

    let selected: Vec<&Backup> = match name {
        Some(name) => {
            let found = backups
                .iter()
                .find(|b| b.name() == name)
                .with_context(|| format!("No backup named '{name}'"))?;
            vec![found]
        }
        None => backups.iter().collect(),
    };

    if selected.is_empty() {
        print_info("No backups configured");
        return Ok(());
    }

    for backup in selected {
        if !backup.provider().password_is_set() {
            print_warning(&format!(
                "Backup '{}': no password configured and RESTIC_PASSWORD is unset",
                backup.name()
            ));
        }
        if init {
            backup
                .init_repo()
                .with_context(|| format!("Failed to initialise repository for '{}'", backup.name()))?;
        }
        backup
            .run()
            .with_context(|| format!("Backup '{}' failed", backup.name()))?;
        print_success(&format!("Backup '{}' completed", backup.name()));
    }

    Ok(())
}
