//! Diff command
//!
//! Usage: flowver diff <ARTIFACT_ID> <A> <B> [--json]

use clap::Args;
use flowver_core::diff::render_human_summary;
use flowver_core::model::Selector;
use flowver_engine::VersionService;

use super::{print_json, CommandResult};

#[derive(Debug, Args)]
pub struct DiffArgs {
    pub artifact_id: String,

    /// Left side: version id, number, `vN`, tag, `active`, `latest` or `draft`
    pub a: Selector,

    /// Right side
    pub b: Selector,

    /// Print the structured diff instead of the Markdown summary
    #[arg(long)]
    pub json: bool,
}

pub fn execute(service: &VersionService, args: DiffArgs) -> CommandResult {
    let diff = service.compare_versions(&args.artifact_id, &args.a, &args.b)?;
    if args.json {
        print_json(&diff)
    } else {
        print!("{}", render_human_summary(&diff));
        Ok(())
    }
}
