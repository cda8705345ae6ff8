use crate::commands::{print_error, print_info, print_success};
use crate::config::WatchConfig;
use crate::ifile::{Hook, WatchJob};
use crate::KopyatContext;
use anyhow::{Context, Result};
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Execute the watch command: one thread per configured watch entry, each
/// owning a [`WatchJob`]. Blocks until every job has exited.
///
/// # Errors
///
/// Returns an error if no jobs could be started or any job exited with a
/// failure.
pub fn execute(ctx: &KopyatContext) -> Result<()> {
    if ctx.config.watches.is_empty() {
        print_info("No watches configured");
        return Ok(());
    }

    let mut handles = Vec::with_capacity(ctx.config.watches.len());
    for entry in &ctx.config.watches {
        let job = Arc::new(build_job(ctx, entry));
        info!(
            watch = %entry.name,
            scan_path = %entry.scan_path.display(),
            "starting watch job"
        );
        let runner = Arc::clone(&job);
        let name = entry.name.clone();
        let handle = thread::spawn(move || runner.run());
        handles.push((name, job, handle));
    }

    let mut failed = 0usize;
    for (name, job, handle) in handles {
        let result = handle.join().expect("watch job thread panicked");
        match result {
            Ok(()) => print_success(&format!("Watch '{}' stopped ({})", name, job.status())),
            Err(err) => {
                failed += 1;
                for recorded in job.info().errors {
                    print_error(&format!("Watch '{name}': {recorded}"));
                }
                print_error(&format!("Watch '{name}' failed: {err}"));
            }
        }
    }

    anyhow::ensure!(failed == 0, "{failed} watch job(s) failed");
    Ok(())
}

fn build_job(ctx: &KopyatContext, entry: &WatchConfig) -> WatchJob {
    let debounce = entry.debounce_ms.unwrap_or(ctx.config.watch.debounce_ms);
    let fail_after = entry
        .fail_after_secs
        .unwrap_or(ctx.config.watch.fail_after_secs);

    let mut job = WatchJob::new(&entry.ifile, &entry.scan_path, entry.mode)
        .debounce(Duration::from_millis(debounce))
        .fail_after(Duration::from_secs(fail_after));
    if let Some(command) = &entry.pre_hook {
        job = job.pre_hook(command_hook(command.clone()));
    }
    if let Some(command) = &entry.post_hook {
        job = job.post_hook(command_hook(command.clone()));
    }
    job
}

/// Wraps a shell command string as a walk hook. The command is split with
/// shell quoting rules and run with inherited stdio; a non-zero exit is a
/// hook failure.
fn command_hook(command: String) -> Hook {
    Box::new(move || {
        let words = shell_words::split(&command)
            .with_context(|| format!("Invalid hook command: '{command}'"))?;
        let (program, args) = words
            .split_first()
            .with_context(|| "Empty hook command")?;
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to run hook '{command}'"))?;
        anyhow::ensure!(status.success(), "hook '{command}' exited with {status}");
        Ok(())
    })
}
