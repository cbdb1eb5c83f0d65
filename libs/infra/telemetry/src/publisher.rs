use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use solarreg_core::RegulatorEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Governs whether, and how much, telemetry is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryMode {
    /// Nothing is published; `TelemetryPublisher` becomes a no-op sink.
    Disabled,
    /// Run samples and events are both published.
    #[default]
    Full,
    /// Only events are published; run samples (published on every decision)
    /// are skipped to reduce broker load.
    EventsOnly,
}

const CHANNEL_CAPACITY: usize = 64;

enum Outbound {
    Run(String),
    Event(String),
}

/// Non-blocking MQTT publisher. `publish_run` / `publish_event` hand off to
/// a background task over a bounded channel and never await network I/O
/// themselves, so a slow or unreachable broker cannot stall the control loop.
pub struct TelemetryPublisher {
    mode: TelemetryMode,
    tx: Option<mpsc::Sender<Outbound>>,
    run_topic: String,
    evt_topic: String,
}

impl TelemetryPublisher {
    /// Spawns the background MQTT task (unless `mode` is [`TelemetryMode::Disabled`])
    /// and returns the publisher handle plus its `JoinHandle`, so the caller
    /// can fold it into its own task-supervision `select!`.
    pub fn connect(
        mode: TelemetryMode,
        broker_host: &str,
        broker_port: u16,
        client_id: &str,
        root_topic: &str,
    ) -> (Self, Option<JoinHandle<()>>) {
        let run_topic = format!("{root_topic}/run");
        let evt_topic = format!("{root_topic}/evt");

        if mode == TelemetryMode::Disabled {
            return (Self { mode, tx: None, run_topic, evt_topic }, None);
        }

        let status_topic = format!("{root_topic}/status");
        let mut opts = MqttOptions::new(client_id, broker_host, broker_port);
        opts.set_keep_alive(Duration::from_secs(30));
        opts.set_last_will(LastWill::new(&status_topic, b"offline".to_vec(), QoS::AtLeastOnce, true));

        let (client, eventloop) = AsyncClient::new(opts, CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = tokio::spawn(run_event_loop(client, eventloop, rx, status_topic, run_topic.clone(), evt_topic.clone()));

        (Self { mode, tx: Some(tx), run_topic, evt_topic }, Some(handle))
    }

    /// Renders the `/run` wire payload: `{"solar", "injection", "power_limit" (percent), "delay"}`.
    /// Exposed so the caller can compare it against the last published payload
    /// for dedup before deciding whether to call [`Self::publish_run`] at all.
    pub fn render_run_payload(solar_power: i32, injection_power: i32, new_limit_permille: i32, delay_s: i32) -> String {
        serde_json::json!({
            "solar": solar_power,
            "injection": injection_power,
            "power_limit": new_limit_permille as f64 / 10.0,
            "delay": delay_s,
        })
        .to_string()
    }

    /// Publishes an already-rendered `/run` payload (see [`Self::render_run_payload`]).
    /// Silently dropped if the channel is full, telemetry is disabled, or the
    /// mode is `EventsOnly`. Callers are responsible for the payload-equality
    /// dedup described in §4.4; this method always sends what it's given.
    pub fn publish_run(&self, payload: String) {
        if self.mode == TelemetryMode::Disabled || self.mode == TelemetryMode::EventsOnly {
            return;
        }
        let Some(tx) = &self.tx else { return };
        if tx.try_send(Outbound::Run(payload)).is_err() {
            debug!(topic = %self.run_topic, "telemetry channel full, dropping run sample");
        }
    }

    /// Publishes a discrete event (window transitions, Modbus error
    /// streak start/end, fast-path triggers). `msg` is the human-readable
    /// reason tag, or `""` when the event carries none.
    pub fn publish_event(&self, event: RegulatorEvent, msg: &str) {
        if self.mode == TelemetryMode::Disabled {
            return;
        }
        let Some(tx) = &self.tx else { return };
        let payload = serde_json::json!({
            "code": event.code(),
            "msg": msg,
        })
        .to_string();
        if tx.try_send(Outbound::Event(payload)).is_err() {
            warn!(topic = %self.evt_topic, code = event.code(), "telemetry channel full, dropping event");
        }
    }
}

async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    mut rx: mpsc::Receiver<Outbound>,
    status_topic: String,
    run_topic: String,
    evt_topic: String,
) {
    loop {
        tokio::select! {
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt broker connected");
                        if let Err(err) = client.publish(&status_topic, QoS::AtLeastOnce, true, b"online".to_vec()).await {
                            error!(%err, "failed to publish online status");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "mqtt event loop error, will retry");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            msg = rx.recv() => {
                match msg {
                    Some(Outbound::Run(payload)) => {
                        if let Err(err) = client.publish(&run_topic, QoS::AtMostOnce, false, payload).await {
                            warn!(%err, "failed to publish run sample");
                        }
                    }
                    Some(Outbound::Event(payload)) => {
                        if let Err(err) = client.publish(&evt_topic, QoS::AtLeastOnce, false, payload).await {
                            warn!(%err, "failed to publish event");
                        }
                    }
                    None => {
                        debug!("telemetry sender dropped, shutting down mqtt task");
                        break;
                    }
                }
            }
        }
    }
}
