use std::fs::File;

use clap::Parser;

use bank_simulator::config::{Args, Config};
use bank_simulator::dlq::TracingDLQ;
use bank_simulator::domain::UserDirectory;
use bank_simulator::ingestion::CsvReader;
use bank_simulator::simulator::Simulator;
use bank_simulator::{Bank, MemoryStore};

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::from(&args);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.log_level)
        .init();

    let file = File::open(&args.script)?;

    let store = MemoryStore::from_config(&config);
    store.create_admin(&config.bootstrap_admin).await?;

    let mut simulator = Simulator::new(CsvReader::new(file), Bank::new(store), TracingDLQ::default());
    simulator.process().await?;
    simulator.flush(std::io::stdout().lock()).await?;

    tracing::info!(rejected = simulator.dlq().rejected(), "script finished");
    Ok(())
}
