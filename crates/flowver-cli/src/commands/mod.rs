//! Subcommand implementations and shared plumbing

pub mod artifact;
pub mod diff;
pub mod metrics;
pub mod version;

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use flowver_core_types::RequestContext;
use flowver_engine::{VersionService, VersioningConfig};
use serde::Serialize;
use serde_json::Value;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Flags shared by every subcommand
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides the configuration file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Actor recorded on publishes and activations
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Emit JSON logs on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
}

impl GlobalArgs {
    pub fn request_context(&self) -> RequestContext {
        let ctx = RequestContext::new();
        match &self.actor {
            Some(actor) => ctx.with_actor(actor.clone()),
            None => ctx,
        }
    }
}

/// Build the service from `--config`, the environment and `--db`.
pub fn open_service(global: &GlobalArgs) -> Result<VersionService, Box<dyn std::error::Error>> {
    let mut config = match &global.config {
        Some(path) => VersioningConfig::load(path)?,
        None => VersioningConfig::from_env()?,
    };
    if let Some(db) = &global.db {
        config.store.path = db.clone();
    }
    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(VersionService::open(&config)?)
}

/// Read a JSON document from a file, or stdin for `-`
pub fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&text)?)
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
