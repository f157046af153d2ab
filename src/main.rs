//! epicsync CLI entry point.

use clap::Parser;
use epicsync::cli::commands;
use epicsync::cli::{Cli, Commands};
use epicsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // Non-TTY stdout implies JSON, except for long-running or raw-output commands.
    let piped = !std::io::IsTerminal::is_terminal(&std::io::stdout());
    let json = cli.json
        || (piped && !matches!(cli.command, Commands::Serve { .. } | Commands::Completions { .. }));

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_ref();
    match &cli.command {
        Commands::Serve {
            bind,
            sync_on_start,
        } => commands::serve::execute(bind.as_deref(), *sync_on_start, db),
        Commands::Sync { command } => commands::sync::execute(command, db, json),
        Commands::Config { command } => commands::config::execute(command, db, json),
        Commands::Items(args) => commands::items::execute(args, db, json),
        Commands::Ask { query, config } => commands::ask::execute(query, *config, db, json),
        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Version => commands::version::execute(json),
    }
}
