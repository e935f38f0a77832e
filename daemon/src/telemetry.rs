/// Game telemetry types and the feature stream they arrive on.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A discrete, named occurrence reported by the game (e.g. a kill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self { name: name.into(), data }
    }

    /// The event name in snake_case (`matchStart` becomes `match_start`).
    pub fn canonical_name(&self) -> String {
        canonical_event_name(&self.name)
    }
}

/// A periodic structured state report from the game. Only a handful of paths
/// are ever inspected; the rest of the record is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoSnapshot(pub Value);

impl InfoSnapshot {
    /// Value at `section.key`, if the section exists and the value is non-null.
    pub fn field(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)?.get(key).filter(|v| !v.is_null())
    }

    /// The `section` sub-record, if present and non-null.
    pub fn section(&self, section: &str) -> Option<&Value> {
        self.0.get(section).filter(|v| !v.is_null())
    }
}

/// Converts camelCase event names to snake_case. Names already in snake_case
/// pass through, and runs of capitals (`MATCH_START`, `MVPAward`) stay one word.
pub fn canonical_event_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let word_start = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if word_start {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Source of game events and info snapshots.
///
/// After a successful `subscribe`, the provider posts
/// [`AppEvent::GameEvents`](crate::event::AppEvent::GameEvents) and
/// [`AppEvent::InfoUpdate`](crate::event::AppEvent::InfoUpdate) onto the event loop.
pub trait FeatureStreamProvider {
    async fn subscribe(&self, features: &[String]) -> Result<()>;
}
