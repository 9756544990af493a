//! hiring-e2e entry point
//!
//! Runs workflow definitions against the platform and prints the summary.
//! Exit codes: 0 all workflows passed, 1 a workflow failed, 2 setup error.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hiring_e2e::runner::exit_code;
use hiring_e2e::{E2eError, E2eResult, RunnerConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "hiring-e2e")]
#[command(about = "End-to-end workflow runner for the hiring platform API")]
struct Args {
    /// Workflow YAML file, or a directory of them
    workflow: PathBuf,

    /// Runner configuration (base URL, actors, poll defaults)
    #[arg(short, long, env = "HIRING_E2E_CONFIG", default_value = "hiring-e2e.toml")]
    config: PathBuf,

    /// Override the platform base URL from the configuration
    #[arg(long, env = "HIRING_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Run only workflows carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the workflow with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Do not wait for the health endpoint before running
    #[arg(long)]
    skip_health_check: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    let outcome = rt.block_on(async_main(args));
    if let Err(e) = &outcome {
        eprintln!("Error: {}", e);
    }
    std::process::exit(exit_code(&outcome));
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = RunnerConfig::load_required(&args.config)?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if args.skip_health_check {
        config.health_path = None;
    }

    let runner = TestRunner::new(config)?;
    runner.check_health().await?;

    let results = if let Some(name) = args.name {
        runner.run_named(&args.workflow, &name).await?
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&args.workflow, &tag).await?
    } else {
        runner.run_path(&args.workflow).await?
    };

    if results.total == 0 {
        return Err(E2eError::WorkflowParse(format!(
            "no workflows matched in {}",
            args.workflow.display()
        )));
    }

    print!("{}", results.render());
    Ok(results.success())
}
