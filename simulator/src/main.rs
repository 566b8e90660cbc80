use anyhow::Context;
use clap::{Parser, ValueEnum};
use rficore::pipeline::BaselineSelection;
use std::path::PathBuf;
use workflow::config::{WorkflowConfig, WorkflowOverrides};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SelectionArg {
    All,
    Cross,
    Auto,
}

impl From<SelectionArg> for BaselineSelection {
    fn from(arg: SelectionArg) -> Self {
        match arg {
            SelectionArg::All => BaselineSelection::All,
            SelectionArg::Cross => BaselineSelection::CrossCorrelations,
            SelectionArg::Auto => BaselineSelection::AutoCorrelations,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Runs the flagging strategy over a synthetic observation")]
struct Args {
    /// Load scenario and strategy from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    antennas: Option<usize>,
    #[arg(long)]
    time_steps: Option<usize>,
    #[arg(long)]
    channels: Option<usize>,
    /// Worker threads including the reader; defaults to the core count
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long)]
    memory_budget_mb: Option<u64>,
    #[arg(long, value_enum)]
    selection: Option<SelectionArg>,
    #[arg(long)]
    seed: Option<u64>,
    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> WorkflowOverrides {
        WorkflowOverrides {
            antennas: self.antennas,
            time_steps: self.time_steps,
            channels: self.channels,
            threads: self.threads,
            memory_budget_mb: self.memory_budget_mb,
            selection: self.selection.map(BaselineSelection::from),
            seed: self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    workflow_config.apply(&args.overrides());

    let result = Runner::new(workflow_config)
        .execute()
        .context("running flagging workflow")?;

    println!(
        "{}: {} baselines, {:.2}% flagged, {} bad baseline(s), bad stations {:?}",
        result.source,
        result.baselines_reported,
        100.0 * result.flagged_fraction,
        result.bad_baselines.len(),
        result.bad_stations
    );
    if let Some(pipeline) = &result.pipeline {
        println!(
            "pipeline: {} worker(s), {}/{} processed, {} failed, queue peak {}/{}",
            pipeline.workers,
            pipeline.processed,
            pipeline.selected,
            pipeline.failed,
            pipeline.peak_queued,
            pipeline.high_water
        );
        for warning in &pipeline.warnings {
            println!("warning: {}", warning);
        }
    }
    if let Some(failure) = &result.failure {
        println!("failures: {}", failure);
    }

    if let Some(path) = &args.report {
        result.write_report(path)?;
    }

    Ok(())
}
