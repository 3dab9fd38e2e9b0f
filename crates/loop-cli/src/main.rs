use std::error::Error;

use clap::{Parser, Subcommand};

mod commands;

use commands::{
    analytics::AnalyticsArgs, artifact::ArtifactArgs, exec::ExecArgs, retention::RetentionArgs,
    status::StatusArgs, validate::ValidateArgs, version::VersionArgs, GlobalArgs,
};

#[derive(Parser, Debug)]
#[command(name = "loopai", about = "Loopai edge runtime operator tool", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store, inspect and activate program artifacts
    Artifact(ArtifactArgs),
    /// Execute the active artifact once
    Exec(ExecArgs),
    /// Today's execution count and mean latency
    Metrics(StatusArgs),
    /// Health of the runtime for one task
    Health(StatusArgs),
    /// Daily analytics, optionally exported as CSV
    Analytics(AnalyticsArgs),
    /// Delete execution partitions outside the retention window
    Retention(RetentionArgs),
    /// Validate a day of executions against a replay oracle
    Validate(ValidateArgs),
    /// Print version information
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let global = &cli.global;
    match &cli.command {
        Command::Artifact(args) => commands::artifact::run(global, args)?,
        Command::Exec(args) => commands::exec::run(global, args)?,
        Command::Metrics(args) => commands::status::metrics(global, args)?,
        Command::Health(args) => commands::status::health(global, args)?,
        Command::Analytics(args) => commands::analytics::run(global, args)?,
        Command::Retention(args) => commands::retention::run(global, args)?,
        Command::Validate(args) => commands::validate::run(global, args)?,
        Command::Version(args) => commands::version::run(args)?,
    }
    Ok(())
}
