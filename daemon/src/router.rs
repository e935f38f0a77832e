/// Routing of feature-stream telemetry: store, republish locally, and forward
/// an allow-listed subset to the external sink.
use serde_json::Value;
use std::sync::Arc;

use crate::bus::{BusMessage, SharedState};
use crate::sink::SinkHandle;
use crate::telemetry::{InfoSnapshot, TelemetryEvent};

/// Canonical (snake_case) event names forwarded to the sink.
pub const FORWARDED_EVENTS: &[&str] = &[
    "kill",
    "death",
    "match_start",
    "round_start",
    "round_end",
    "match_end",
    "match_win",
    "match_lose",
    "spike_defused",
    "spike_detonated",
];

/// Event that re-applies the game surface in case the running-game transition was missed.
pub const MATCH_START: &str = "match_start";

/// `match_info` keys forwarded individually when present.
const MATCH_INFO_FIELDS: &[&str] = &[
    "round_phase",
    "round_number",
    "score",
    "match_score",
    "round_report",
];

pub struct EventRouter {
    shared: Arc<SharedState>,
    sink: SinkHandle,
}

impl EventRouter {
    pub fn new(shared: Arc<SharedState>, sink: SinkHandle) -> Self {
        Self { shared, sink }
    }

    /// Stores, publishes and (if allow-listed) forwards one event.
    ///
    /// Returns `true` when the event is a match start and the caller should
    /// restore the game surface.
    pub fn on_event(&self, event: TelemetryEvent) -> bool {
        let name = event.canonical_name();
        tracing::debug!(target: "router", "Event '{}'", event.name);

        self.shared.events.push(event.clone());
        self.shared.bus.publish(BusMessage::Event(event.clone()));
        if is_forwarded(&name) {
            self.sink.deliver(name.as_str(), event.data.to_string());
        }

        name == MATCH_START
    }

    /// Stores and publishes a snapshot, then forwards each inspected field
    /// that is present as its own delivery.
    pub fn on_info_update(&self, snapshot: InfoSnapshot) {
        self.shared.info.push(snapshot.clone());
        self.shared.bus.publish(BusMessage::Info(snapshot.clone()));

        if let Some(health) = snapshot.field("player", "health") {
            self.sink.deliver("health", field_text(health));
        }

        if snapshot.section("match_info").is_some() {
            for key in MATCH_INFO_FIELDS {
                if let Some(value) = snapshot.field("match_info", key) {
                    self.sink.deliver(*key, field_text(value));
                }
            }
        }
    }
}

pub fn is_forwarded(canonical_name: &str) -> bool {
    FORWARDED_EVENTS.contains(&canonical_name)
}

/// Strings are sent as-is; everything else as compact JSON.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
