//! Execution metrics commands

use clap::{Args, ValueEnum};
use flowver_core::model::{Channel, ExecutionOutcome};
use flowver_engine::VersionService;
use flowver_store::metrics::ExecutionRecord;

use super::{print_json, CommandResult};

#[derive(Debug, Args)]
pub struct MetricsArgs {
    pub version_id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutcomeArg {
    Success,
    Failure,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    pub version_id: String,

    #[arg(long, value_enum)]
    pub outcome: OutcomeArg,

    #[arg(long, default_value_t = 0)]
    pub duration_ms: u64,

    /// Trigger channel: api, mcp, webhook or public
    #[arg(long)]
    pub channel: Option<String>,
}

pub fn execute_metrics(service: &VersionService, args: MetricsArgs) -> CommandResult {
    print_json(&service.get_version_metrics(&args.version_id)?)
}

pub fn execute_record(service: &VersionService, args: RecordArgs) -> CommandResult {
    let outcome = match args.outcome {
        OutcomeArg::Success => ExecutionOutcome::Success,
        OutcomeArg::Failure => ExecutionOutcome::Failure,
    };
    // Unknown channels still count toward the totals
    let channel = args.channel.as_deref().and_then(Channel::parse);
    let record = ExecutionRecord::new(args.version_id, outcome, args.duration_ms, channel);
    if service.record_execution(&record) {
        println!("Recorded");
    } else {
        println!("Not recorded (see log)");
    }
    Ok(())
}
