//! Artifact and draft commands
//!
//! Usage: flowver artifact <create|draft|draft-from|show> ...

use std::path::PathBuf;

use clap::{Args, Subcommand};
use flowver_core_types::RequestContext;
use flowver_engine::VersionService;

use super::{print_json, read_json, CommandResult};

#[derive(Debug, Args)]
pub struct ArtifactArgs {
    #[command(subcommand)]
    pub command: ArtifactCommand,
}

#[derive(Debug, Subcommand)]
pub enum ArtifactCommand {
    /// Create an artifact, optionally with an initial draft
    Create(CreateArgs),
    /// Replace the working draft
    Draft(DraftArgs),
    /// Copy a published version into the working draft
    DraftFrom(DraftFromArgs),
    /// Artifact with its history, active version and draft
    Show(ShowArtifactArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub name: String,

    /// JSON file with the initial draft (`-` for stdin)
    #[arg(long)]
    pub draft: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DraftArgs {
    pub artifact_id: String,

    /// JSON file with the draft payload (`-` for stdin)
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct DraftFromArgs {
    pub artifact_id: String,

    /// Version identifier: id, number, `vN`, tag, `active` or `latest`
    pub version: String,
}

#[derive(Debug, Args)]
pub struct ShowArtifactArgs {
    pub artifact_id: String,
}

pub fn execute(service: &VersionService, ctx: &RequestContext, args: ArtifactArgs) -> CommandResult {
    match args.command {
        ArtifactCommand::Create(create_args) => {
            let draft = create_args.draft.as_deref().map(read_json).transpose()?;
            let artifact = service.create_artifact(ctx, &create_args.name, draft.as_ref())?;
            println!("{}", artifact.id);
            Ok(())
        }
        ArtifactCommand::Draft(draft_args) => {
            let payload = read_json(&draft_args.file)?;
            service.save_draft(ctx, &draft_args.artifact_id, &payload)?;
            println!("Draft saved");
            Ok(())
        }
        ArtifactCommand::DraftFrom(from_args) => {
            let version = service.get_version(&from_args.artifact_id, &from_args.version)?;
            service.create_draft_from_version(ctx, &from_args.artifact_id, version.id())?;
            println!("Draft restored from {}", version.header.label());
            Ok(())
        }
        ArtifactCommand::Show(show_args) => {
            print_json(&service.get_artifact_with_versions(&show_args.artifact_id)?)
        }
    }
}
