use anyhow::Result;
use clap::Parser;
use voice_relay_cli::{Cli, commands, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => eprintln!("Ignoring malformed .env: {e}"),
        _ => {}
    }
    telemetry::init_telemetry("voice-relay");

    let cli = Cli::parse();
    commands::execute(cli.command).await
}
