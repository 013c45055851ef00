//! In-process stand-in for a PHYSIs kit and its vendor transport.
//!
//! The simulated kit answers connect requests, streams sensing frames on an
//! interval and reacts to `DH`/`DL`/`A<n>` commands the way the kit sketch
//! does: the button field follows the digital output.

use crate::core::communication::{
    BleEvent, BleTransport, EventSender, MqttEvent, MqttTransport,
};
use crate::core::communication::event::{BLE_CONNECTED, BLE_DISCONNECTED, BLE_NO_DISCOVERY};
use crate::core::protocol::{ButtonState, OutboundCommand, TelemetryFrame};
use crate::domain::config::SimulatorConfig;
use crate::domain::error::PhysisResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Actuator state of the simulated kit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KitOutputs {
    pub digital_high: bool,
    pub analog: Option<String>,
}

/// Shared behaviour of both simulated links
struct KitCore {
    config: SimulatorConfig,
    outputs: Arc<Mutex<KitOutputs>>,
    link_task: Mutex<Option<JoinHandle<()>>>,
}

impl KitCore {
    fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            outputs: Arc::new(Mutex::new(KitOutputs::default())),
            link_task: Mutex::new(None),
        }
    }

    fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.config.connect_delay_ms)
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.frame_interval_ms.max(1))
    }

    async fn apply(&self, payload: &str) {
        let command = match OutboundCommand::parse(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Simulated kit ignoring '{}': {}", payload, e);
                return;
            }
        };

        let mut outputs = self.outputs.lock().await;
        match command {
            OutboundCommand::DigitalHigh => outputs.digital_high = true,
            OutboundCommand::DigitalLow => outputs.digital_high = false,
            OutboundCommand::AnalogWrite(value) => outputs.analog = Some(value),
        }
        debug!("Simulated kit outputs now {:?}", *outputs);
    }

    /// Replace the running link task, stopping the previous one
    async fn replace_task(&self, task: Option<JoinHandle<()>>) -> bool {
        let mut slot = self.link_task.lock().await;
        let previous = std::mem::replace(&mut *slot, task);
        match previous {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }
}

impl Drop for KitCore {
    fn drop(&mut self) {
        if let Some(handle) = self.link_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Sensing frame for the given tick
pub fn simulated_frame(tick: u64, outputs: &KitOutputs) -> TelemetryFrame {
    let lux_base = outputs
        .analog
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(100);

    TelemetryFrame {
        temperature: (22 + tick % 5).to_string(),
        humidity: (45 + tick.wrapping_mul(3) % 10).to_string(),
        // analog values are unchecked text, so any u64 can land here
        illuminance: lux_base.saturating_add(tick.wrapping_mul(7) % 40).to_string(),
        button: if outputs.digital_high {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        },
    }
}

/// Emit frames until the queue closes
async fn stream_frames<E, F>(
    outputs: Arc<Mutex<KitOutputs>>,
    interval: Duration,
    events: EventSender<E>,
    wrap: F,
) where
    E: std::fmt::Debug,
    F: Fn(String) -> E,
{
    let mut ticker = tokio::time::interval(interval);
    let mut tick = 0u64;
    loop {
        ticker.tick().await;
        let frame = {
            let outputs = outputs.lock().await;
            simulated_frame(tick, &outputs)
        };
        if !events.emit(wrap(frame.encode())) {
            debug!("Simulated kit stopped streaming: controller gone");
            break;
        }
        tick += 1;
    }
}

/// Simulated kit reached over BLE
pub struct SimulatedBleKit {
    core: KitCore,
    events: EventSender<BleEvent>,
}

impl SimulatedBleKit {
    pub fn new(config: SimulatorConfig, events: EventSender<BleEvent>) -> Self {
        Self {
            core: KitCore::new(config),
            events,
        }
    }

    pub async fn outputs(&self) -> KitOutputs {
        self.core.outputs.lock().await.clone()
    }
}

#[async_trait]
impl BleTransport for SimulatedBleKit {
    async fn connect(&self, serial_number: &str) -> PhysisResult<()> {
        let found = serial_number == self.core.config.serial_number;
        let delay = self.core.connect_delay();
        let interval = self.core.frame_interval();
        let outputs = Arc::clone(&self.core.outputs);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !found {
                events.emit(BleEvent::ConnectionResult(BLE_NO_DISCOVERY));
                return;
            }
            if events.emit(BleEvent::ConnectionResult(BLE_CONNECTED)) {
                stream_frames(outputs, interval, events, BleEvent::Message).await;
            }
        });

        self.core.replace_task(Some(task)).await;
        info!("Simulated BLE kit scanning for {}", serial_number);
        Ok(())
    }

    async fn disconnect(&self) -> PhysisResult<()> {
        if self.core.replace_task(None).await {
            self.events.emit(BleEvent::ConnectionResult(BLE_DISCONNECTED));
        }
        Ok(())
    }

    async fn send(&self, payload: &str) -> PhysisResult<()> {
        self.core.apply(payload).await;
        Ok(())
    }
}

/// Simulated kit reached through a broker
pub struct SimulatedMqttKit {
    core: KitCore,
    events: EventSender<MqttEvent>,
}

impl SimulatedMqttKit {
    pub fn new(config: SimulatorConfig, events: EventSender<MqttEvent>) -> Self {
        Self {
            core: KitCore::new(config),
            events,
        }
    }

    pub async fn outputs(&self) -> KitOutputs {
        self.core.outputs.lock().await.clone()
    }
}

#[async_trait]
impl MqttTransport for SimulatedMqttKit {
    async fn connect(&self) -> PhysisResult<()> {
        let delay = self.core.connect_delay();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(MqttEvent::ConnectionResult(true));
        });

        self.core.replace_task(Some(task)).await;
        info!("Simulated broker connecting");
        Ok(())
    }

    async fn disconnect(&self) -> PhysisResult<()> {
        self.core.replace_task(None).await;
        self.events.emit(MqttEvent::Disconnected);
        Ok(())
    }

    async fn subscribe(&self, device_id: &str, topic: &str) -> PhysisResult<()> {
        let config = &self.core.config;
        if device_id != config.serial_number || topic != config.monitor_topic {
            // nothing is ever published there
            debug!("Simulated broker: no publisher for {} on '{}'", device_id, topic);
            return Ok(());
        }

        let outputs = Arc::clone(&self.core.outputs);
        let interval = self.core.frame_interval();
        let events = self.events.clone();
        let device_id = config.serial_number.clone();
        let topic = config.monitor_topic.clone();

        let task = tokio::spawn(async move {
            stream_frames(outputs, interval, events, move |payload| {
                MqttEvent::SubscribeMessage {
                    device_id: device_id.clone(),
                    topic: topic.clone(),
                    payload,
                }
            })
            .await;
        });

        self.core.replace_task(Some(task)).await;
        info!("Simulated kit publishing on '{}'", config.monitor_topic);
        Ok(())
    }

    async fn publish(&self, device_id: &str, topic: &str, payload: &str) -> PhysisResult<()> {
        let config = &self.core.config;
        if device_id == config.serial_number && topic == config.control_topic {
            self.core.apply(payload).await;
        } else {
            debug!("Simulated broker: no subscriber for {} on '{}'", device_id, topic);
        }
        Ok(())
    }
}
