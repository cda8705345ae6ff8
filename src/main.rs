use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Generator, Shell};
use colored::Colorize;
use kopyat::{commands, KopyatContext};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kopyat",
    version = kopyat::VERSION,
    about = "Automated file-tree backups driven by ignore rules",
    long_about = "Generates include files from gitignore-style rules, keeps them fresh \
                  with filesystem watches, and drives restic with the result"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one named backup, or all configured backups
    Backup {
        /// Backup entry to run (all entries when omitted)
        name: Option<String>,

        /// Initialise the repository before backing up
        #[arg(long)]
        init: bool,
    },

    /// Run the configured watch jobs until they stop
    Watch,

    /// Check the environment for problems
    Doctor,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let context = match &cli.config {
        Some(path) => KopyatContext::new_explicit(path.clone())?,
        None => KopyatContext::new()?,
    };

    match cli.command {
        Commands::Backup { name, init } => {
            commands::backup::execute(&context, name.as_deref(), init)?;
        }
        Commands::Watch => {
            commands::watch::execute(&context)?;
        }
        Commands::Doctor => {
            commands::doctor::execute(&context)?;
        }
        Commands::Completion { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("kopyat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
