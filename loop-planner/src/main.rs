use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod planner;
mod scenario;

use common::config::EngineConfig;
use scenario::Scenario;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let program = args.first().map(String::as_str).unwrap_or("loop-planner");
        bail!("usage: {} <config.toml> <scenario.toml>", program);
    }

    info!("Starting Loop Planner");

    let config = EngineConfig::from_file(&args[1])?;
    let scenario = Scenario::from_file(&args[2])?;

    let report = planner::run(&config, &scenario)?;
    if let Some(plan) = &report.plan {
        info!(
            "Planned {} iterations in {} transactions",
            plan.iterations(),
            report.transactions.len()
        );
    }

    let output = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
    println!("{}", output);

    Ok(())
}
