use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use solarreg_logging::LogSink;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Subscribes to the regulator's MQTT run/event topics and appends every
/// message as a CSV row, as a standalone substitute for in-daemon storage.
#[derive(Debug, Parser)]
#[command(name = "solar-mqtt-recorder", version, about)]
struct Cli {
    #[arg(long, env = "SOLARREG_MQTT_HOST", default_value = "127.0.0.1")]
    mqtt_host: String,

    #[arg(long, env = "SOLARREG_MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    #[arg(long, env = "SOLARREG_MQTT_ROOT_TOPIC", default_value = "solar_power_regulator")]
    root_topic: String,

    /// Directory the CSV files are written into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct RunRow {
    received_at: String,
    payload: String,
}

#[derive(Debug, Serialize)]
struct EvtRow {
    received_at: String,
    payload: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = solarreg_logging::init("solar-mqtt-recorder", LogSink::Stdout, "info")?;
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.out_dir).context("failed to create output directory")?;
    let run_path = cli.out_dir.join("solar_power_regulator_run.csv");
    let evt_path = cli.out_dir.join("solar_power_regulator_evt.csv");
    let mut run_writer = csv::Writer::from_path(&run_path).context("failed to open run CSV")?;
    let mut evt_writer = csv::Writer::from_path(&evt_path).context("failed to open event CSV")?;

    let run_topic = format!("{}/run", cli.root_topic);
    let evt_topic = format!("{}/evt", cli.root_topic);

    let mut opts = MqttOptions::new("solar-mqtt-recorder", &cli.mqtt_host, cli.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(opts, 16);

    info!(run_topic = %run_topic, evt_topic = %evt_topic, "recording to CSV");

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                client.subscribe(&run_topic, QoS::AtLeastOnce).await.context("failed to subscribe to run topic")?;
                client.subscribe(&evt_topic, QoS::AtLeastOnce).await.context("failed to subscribe to event topic")?;
                info!("subscribed after (re)connect");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload).to_string();
                let received_at = Utc::now().to_rfc3339();
                if publish.topic == run_topic {
                    run_writer.serialize(RunRow { received_at, payload })?;
                    run_writer.flush()?;
                } else if publish.topic == evt_topic {
                    evt_writer.serialize(EvtRow { received_at, payload })?;
                    evt_writer.flush()?;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "mqtt event loop error, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
