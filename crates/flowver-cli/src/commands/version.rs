//! Publish, activation and lookup commands

use clap::{Args, ValueEnum};
use flowver_core::model::Selector;
use flowver_core_types::RequestContext;
use flowver_engine::{PublishOptions, ResolveContext, VersionService};
use flowver_store::active::SwitchOutcome;
use flowver_store::versions::Pagination;
use serde_json::{Map, Value};

use super::{print_json, CommandResult};

#[derive(Debug, Args)]
pub struct PublishArgs {
    pub artifact_id: String,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long)]
    pub changelog: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Baseline version id for no-op detection and lineage
    #[arg(long)]
    pub from: Option<String>,

    /// Activate the new version in the same transaction
    #[arg(long)]
    pub activate: bool,
}

#[derive(Debug, Args)]
pub struct ActivateArgs {
    pub artifact_id: String,

    /// Version identifier: id, number, `vN` or tag
    pub version: String,
}

/// Caller context for `show`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ContextArg {
    Production,
    ExternalTrigger,
    EditorPreview,
}

impl From<ContextArg> for ResolveContext {
    fn from(arg: ContextArg) -> Self {
        match arg {
            ContextArg::Production => ResolveContext::Production,
            ContextArg::ExternalTrigger => ResolveContext::ExternalTrigger,
            ContextArg::EditorPreview => ResolveContext::EditorPreview,
        }
    }
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub artifact_id: String,

    /// `active`, `latest`, `draft`, a version id, number, `vN` or tag
    #[arg(default_value = "active")]
    pub selector: Selector,

    #[arg(long, value_enum, default_value = "editor-preview")]
    pub context: ContextArg,

    /// Print only the payload
    #[arg(long)]
    pub payload: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub artifact_id: String,

    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Only versions numbered below this
    #[arg(long)]
    pub before: Option<i64>,
}

#[derive(Debug, Args)]
pub struct AnnotateArgs {
    pub version_id: String,

    #[arg(long)]
    pub changelog: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct ActivationsArgs {
    pub artifact_id: String,

    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

pub fn execute_publish(service: &VersionService, ctx: &RequestContext, args: PublishArgs) -> CommandResult {
    let options = PublishOptions {
        version_tag: args.tag,
        created_from_version_id: args.from,
        changelog: args.changelog,
        description_version: args.description,
        activate: args.activate,
    };
    let outcome = service.publish_version(ctx, &args.artifact_id, &options)?;
    let snapshot = outcome.snapshot();
    if outcome.is_created() {
        println!("Published {}", snapshot.header.label());
    } else {
        println!("No changes; {} is unchanged", snapshot.header.label());
    }
    println!("  version_id: {}", snapshot.id());
    println!("  payload_hash: {}", snapshot.payload_hash());
    if snapshot.is_active() {
        println!("  active: true");
    }
    Ok(())
}

pub fn execute_activate(service: &VersionService, ctx: &RequestContext, args: ActivateArgs) -> CommandResult {
    let version = service.get_version(&args.artifact_id, &args.version)?;
    match service.set_active_version(ctx, &args.artifact_id, version.id())? {
        SwitchOutcome::Switched(record) => {
            println!("Activated {}", version.header.label());
            if let Some(previous) = record.previous_version_id {
                println!("  previous: {}", previous);
            }
        }
        SwitchOutcome::AlreadyActive => println!("{} is already active", version.header.label()),
    }
    Ok(())
}

pub fn execute_rollback(service: &VersionService, ctx: &RequestContext, args: ActivateArgs) -> CommandResult {
    let version = service.get_version(&args.artifact_id, &args.version)?;
    let record = service.rollback_to_version(ctx, &args.artifact_id, version.id())?;
    println!("Rolled back to {}", version.header.label());
    if let Some(previous) = record.previous_version_id {
        println!("  previous: {}", previous);
    }
    Ok(())
}

pub fn execute_show(service: &VersionService, args: ShowArgs) -> CommandResult {
    let resolution = service.resolve(&args.artifact_id, &args.selector, args.context.into())?;
    if args.payload {
        return print_json(resolution.payload());
    }
    match resolution.snapshot() {
        Some(snapshot) => print_json(snapshot),
        None => print_json(resolution.payload()),
    }
}

pub fn execute_history(service: &VersionService, args: HistoryArgs) -> CommandResult {
    let page = service.get_version_history(
        &args.artifact_id,
        Pagination {
            before: args.before,
            limit: args.limit,
        },
    )?;
    for item in &page.items {
        println!(
            "v{}\t{}\t{}\t{}{}",
            item.version_number,
            item.id,
            item.published_at.to_rfc3339(),
            item.version_tag.as_deref().unwrap_or("-"),
            if item.is_active { "\t(active)" } else { "" }
        );
    }
    if let Some(next) = page.next_before {
        println!("-- more: --before {}", next);
    }
    Ok(())
}

pub fn execute_annotate(service: &VersionService, ctx: &RequestContext, args: AnnotateArgs) -> CommandResult {
    let mut patch = Map::new();
    if let Some(changelog) = args.changelog {
        patch.insert("changelog".to_string(), Value::String(changelog));
    }
    if let Some(description) = args.description {
        patch.insert("description_version".to_string(), Value::String(description));
    }
    if patch.is_empty() {
        return Err("Must specify --changelog and/or --description".into());
    }
    let header = service.update_version_annotations(ctx, &args.version_id, &Value::Object(patch))?;
    print_json(&header)
}

pub fn execute_activations(service: &VersionService, args: ActivationsArgs) -> CommandResult {
    print_json(&service.list_activations(&args.artifact_id, args.limit)?)
}
