//! The `Want` data model: identity, spec, status, state, and history.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Lifecycle status, mirroring spec §4.4's state machine exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WantStatus {
    Idle,
    Reaching,
    Suspended,
    Achieved,
    Failed,
    Stopped,
}

impl WantStatus {
    /// `failed` and `stopped` are terminal for the current execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, WantStatus::Failed | WantStatus::Stopped)
    }

    /// `achieved` is terminal-until-wake: done for now, but may restart.
    pub fn is_achieved(self) -> bool {
        matches!(self, WantStatus::Achieved)
    }
}

impl Default for WantStatus {
    fn default() -> Self {
        WantStatus::Idle
    }
}

/// A weak parent link: `owner_id` restarts when this want restarts-and-completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub owner_id: String,
}

/// Identity and addressing metadata for a want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WantMetadata {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, rename = "ownerReferences")]
    pub owner_references: Vec<OwnerReference>,
}

/// A label-selector: every key must match equally on the target's labels.
pub type Selector = BTreeMap<String, String>;

/// The declarative portion of a want: parameters, wiring, and recipe origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WantSpec {
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub using: Vec<Selector>,
    #[serde(default)]
    pub recipe: Option<String>,
}

/// One entry in a want's chronological history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    ParamChange {
        timestamp: DateTime<Utc>,
        old: BTreeMap<String, Value>,
        new: BTreeMap<String, Value>,
    },
    StatusTransition {
        timestamp: DateTime<Utc>,
        from: WantStatus,
        to: WantStatus,
    },
    Log {
        timestamp: DateTime<Utc>,
        message: String,
    },
    AgentExecution {
        timestamp: DateTime<Utc>,
        summary: String,
    },
}

/// Connectivity constraints for a want type; `-1` means unbounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectivityDescriptor {
    pub required_in: i32,
    pub required_out: i32,
    pub max_in: i32,
    pub max_out: i32,
}

impl ConnectivityDescriptor {
    pub const UNBOUNDED: i32 = -1;

    pub fn in_bounds(&self, count: usize) -> bool {
        let count = count as i32;
        count >= self.required_in && (self.max_in == Self::UNBOUNDED || count <= self.max_in)
    }

    pub fn out_bounds(&self, count: usize) -> bool {
        let count = count as i32;
        count >= self.required_out && (self.max_out == Self::UNBOUNDED || count <= self.max_out)
    }
}

/// A want's live mutable state bag, shared between its runtime task and
/// any reader (snapshot writer, HTTP `results` handler).
#[derive(Debug, Clone)]
pub struct WantState(Arc<RwLock<Value>>);

impl Default for WantState {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(Value::empty_map())))
    }
}

impl WantState {
    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.write() = value;
    }

    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        f(&mut self.0.write());
    }
}

/// The full identity + spec + status + state + history of one want.
#[derive(Debug, Clone)]
pub struct Want {
    pub metadata: WantMetadata,
    pub spec: WantSpec,
    pub status: WantStatus,
    pub state: WantState,
    pub history: Vec<HistoryEntry>,
    /// Bumped every time `spec.params` changes; the runtime's wake-up
    /// watcher keys off this to detect a parameter trigger.
    pub param_version: u64,
}

impl Want {
    /// Build a new want, assigning a UUID v4 id if the caller left it blank.
    pub fn new(mut metadata: WantMetadata, spec: WantSpec) -> Self {
        if metadata.id.is_empty() {
            metadata.id = Uuid::new_v4().to_string();
        }
        Self {
            metadata,
            spec,
            status: WantStatus::Idle,
            state: WantState::default(),
            history: Vec::new(),
            param_version: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn record_status(&mut self, to: WantStatus) {
        let from = self.status;
        self.status = to;
        self.history.push(HistoryEntry::StatusTransition {
            timestamp: Utc::now(),
            from,
            to,
        });
    }

    pub fn record_log(&mut self, message: impl Into<String>) {
        self.history.push(HistoryEntry::Log {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn record_param_change(
        &mut self,
        old: BTreeMap<String, Value>,
        new: BTreeMap<String, Value>,
    ) {
        self.history.push(HistoryEntry::ParamChange {
            timestamp: Utc::now(),
            old,
            new,
        });
        self.param_version += 1;
    }

    /// Does this want declare `selector` as matched by its labels?
    pub fn matches(&self, selector: &Selector) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.metadata.labels.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str, type_name: &str) -> WantMetadata {
        WantMetadata {
            id: String::new(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
        }
    }

    #[test]
    fn new_assigns_an_id_when_absent() {
        let w = Want::new(metadata("n", "numbers"), WantSpec::default());
        assert!(!w.id().is_empty());
    }

    #[test]
    fn record_status_appends_history() {
        let mut w = Want::new(metadata("n", "numbers"), WantSpec::default());
        w.record_status(WantStatus::Reaching);
        assert_eq!(w.status, WantStatus::Reaching);
        assert_eq!(w.history.len(), 1);
    }

    #[test]
    fn matches_requires_every_selector_key() {
        let mut w = Want::new(metadata("n", "numbers"), WantSpec::default());
        w.metadata.labels.insert("role".into(), "source".into());

        let mut selector = Selector::new();
        selector.insert("role".into(), "source".into());
        assert!(w.matches(&selector));

        selector.insert("extra".into(), "x".into());
        assert!(!w.matches(&selector));
    }

    #[test]
    fn connectivity_bounds_handle_unbounded() {
        let descriptor = ConnectivityDescriptor {
            required_in: 1,
            required_out: 1,
            max_in: 1,
            max_out: ConnectivityDescriptor::UNBOUNDED,
        };
        assert!(descriptor.in_bounds(1));
        assert!(!descriptor.in_bounds(2));
        assert!(descriptor.out_bounds(1000));
    }
}
