//! CLI for the MySensors gateway engine
//!
//! Connects to the configured gateway, logs every event it publishes and
//! runs until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use mysensors_gateway::client::Subscriber;
use mysensors_gateway::config::load_config_from;
use mysensors_gateway::utils::logging;
use mysensors_gateway::{Gateway, GatewayEvent};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mysensors-gateway", version, about)]
struct Cli {
    /// Configuration file (default: config/default.* if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log level override (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Gateway failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            return Err(e.into());
        }
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&settings.logging.level));

    let gateway = Gateway::from_settings(settings.gateway)?;
    let (subscriber, mut events) = Subscriber::channel("cli");
    gateway.add_listener(subscriber);
    gateway.start();

    loop {
        tokio::select! {
            Some(event) = events.recv() => log_event(&event),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                break;
            }
        }
    }

    gateway.stop().await;
    Ok(())
}

fn log_event(event: &GatewayEvent) {
    match event {
        GatewayEvent::MessageReceived(msg) => info!(frame = %msg, "Received"),
        GatewayEvent::AckNotReceived(msg) => warn!(frame = %msg, "Message was never acknowledged"),
        other => info!(event = other.name(), ?other, "Gateway event"),
    }
}
