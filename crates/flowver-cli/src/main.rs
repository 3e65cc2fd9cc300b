//! flowver CLI
//!
//! Command-line management surface for versioned flows

use clap::{Parser, Subcommand};
use flowver_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "flowver")]
#[command(about = "flowver - version control for flow graphs", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Artifact and draft operations
    Artifact(commands::artifact::ArtifactArgs),
    /// Publish the artifact's draft as a new version
    Publish(commands::version::PublishArgs),
    /// Make a version the active one
    Activate(commands::version::ActivateArgs),
    /// Re-activate an earlier version
    Rollback(commands::version::ActivateArgs),
    /// Resolve a selector and print the version
    Show(commands::version::ShowArgs),
    /// Version history, newest first
    History(commands::version::HistoryArgs),
    /// Change changelog / description of a published version
    Annotate(commands::version::AnnotateArgs),
    /// Activation audit trail
    Activations(commands::version::ActivationsArgs),
    /// Compare two versions (or the draft)
    Diff(commands::diff::DiffArgs),
    /// Execution metrics of a version
    Metrics(commands::metrics::MetricsArgs),
    /// Record one execution outcome
    Record(commands::metrics::RecordArgs),
}

fn main() {
    let cli = Cli::parse();
    init(if cli.global.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = commands::open_service(&cli.global).and_then(|service| {
        let ctx = cli.global.request_context();
        match cli.command {
            Commands::Artifact(args) => commands::artifact::execute(&service, &ctx, args),
            Commands::Publish(args) => commands::version::execute_publish(&service, &ctx, args),
            Commands::Activate(args) => commands::version::execute_activate(&service, &ctx, args),
            Commands::Rollback(args) => commands::version::execute_rollback(&service, &ctx, args),
            Commands::Show(args) => commands::version::execute_show(&service, args),
            Commands::History(args) => commands::version::execute_history(&service, args),
            Commands::Annotate(args) => commands::version::execute_annotate(&service, &ctx, args),
            Commands::Activations(args) => commands::version::execute_activations(&service, args),
            Commands::Diff(args) => commands::diff::execute(&service, args),
            Commands::Metrics(args) => commands::metrics::execute_metrics(&service, args),
            Commands::Record(args) => commands::metrics::execute_record(&service, args),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
