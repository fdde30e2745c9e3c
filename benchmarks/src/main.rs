use anyhow::Result;
use clap::Parser;
use courier_benchmarks::{args::Args, runner::BenchmarkRunner};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let runner = BenchmarkRunner::init(args)?;
    let results = runner.run().await?;

    println!("{results}");

    Ok(())
}
