use bridgekit::{
    config::BridgeConfig,
    event::{EventBus, InboundEvent},
    transport::CallbackTransport,
    BridgeClient, Envelope, Error, ParameterValue, Target,
};
use clap::Parser;
use futures::StreamExt;
use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Sends one call through a loopback runtime that echoes every call back as
/// its reply, and prints what came back.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "bridgekit.json")]
    config: PathBuf,

    /// Event name of the call
    #[arg(short, long, default_value = "PING")]
    event: String,

    /// Correlation id (generated when omitted)
    #[arg(short, long)]
    id: Option<String>,

    /// Parameter as key=value; the value is read as JSON when it parses
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Envelope key to unwrap from the reply ("none" prints the whole echo)
    #[arg(long, default_value = "none")]
    envelope: String,

    /// Send without waiting for a reply
    #[arg(long)]
    fire_and_forget: bool,

    /// Also subscribe to the event name and print up to this many echoed events
    #[arg(long, default_value_t = 0)]
    listen: usize,

    /// Stop listening once no event arrived for this long
    #[arg(long, default_value_t = 500)]
    listen_timeout_ms: u64,
}

fn parse_param(raw: &str) -> Result<(String, ParameterValue), Error> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("Parameter must be key=value: {}", raw)))?;
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => ParameterValue::from_serializable(&json)
            .map_err(|e| Error::Config(format!("Unsupported parameter {}: {}", key, e)))?,
        Err(_) => ParameterValue::from(value),
    };
    Ok((key.to_string(), value))
}

fn loopback(event_bus: Arc<EventBus>) -> CallbackTransport {
    CallbackTransport::new(move |call| {
        let event_bus = event_bus.clone();
        async move {
            debug!("runtime <- {}", call.encoded_parameters());
            event_bus.publish(
                InboundEvent::new(call.event_name())
                    .with_id(call.id())
                    .with_data(call.encoded_parameters()),
            );
            Ok(())
        }
    })
}

fn build_target(cli: &Cli) -> Result<Target, Error> {
    let mut target = Target::new(&cli.event);
    if let Some(id) = &cli.id {
        target = target.with_id(id);
    }
    for raw in &cli.params {
        let (key, value) = parse_param(raw)?;
        target = target.parameter(&key, value);
    }
    Ok(target)
}

/// Runs one call against the loopback runtime and returns the lines to print.
async fn exchange(cli: &Cli, config: &BridgeConfig) -> Result<Vec<String>, Error> {
    let envelope = Envelope::from_str(&cli.envelope)
        .map_err(|e| Error::Config(format!("Unknown envelope {}: {}", cli.envelope, e)))?;
    let target = build_target(cli)?;

    let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
    let transport = Arc::new(loopback(event_bus.clone()));
    let client = BridgeClient::new(config, event_bus, transport);

    let subscription = (cli.listen > 0).then(|| client.stream(&cli.event));
    let mut lines = Vec::new();

    if cli.fire_and_forget {
        client.request_without_waiting_response(&target).await?;
        lines.push(format!("sent {}", target));
    } else {
        let reply: serde_json::Value = client.request_decoded(&target, envelope).await?;
        lines.push(reply.to_string());
    }

    if let Some(mut subscription) = subscription {
        // the loopback answers each call once, so fewer events than asked may come
        let idle = Duration::from_millis(cli.listen_timeout_ms);
        for _ in 0..cli.listen {
            match tokio::time::timeout(idle, subscription.next()).await {
                Ok(Some(Some(payload))) => lines.push(format!("event: {}", payload)),
                Ok(Some(None)) => lines.push("event: <undecodable>".to_string()),
                Ok(None) => break,
                Err(_) => {
                    debug!("No event on {} for {:?}, stop listening", cli.event, idle);
                    break;
                }
            }
        }
        subscription.cancel();
    }

    client.shutdown();
    Ok(lines)
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let config = if cli.config.exists() {
        BridgeConfig::from_file(&cli.config)?
    } else {
        BridgeConfig::default()
    };
    info!("config loaded.");
    debug!("config: {:?}", config);

    for line in exchange(cli, &config).await? {
        println!("{}", line);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
