// PHYSIs Link - BLE/MQTT client for PHYSIs maker kits
use anyhow::Context;
use clap::Parser;
use physis_link::cli::{execute_command, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let name = args.command.name();

    execute_command(args)
        .await
        .with_context(|| format!("physis {} failed", name))
}
