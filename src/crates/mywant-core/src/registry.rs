//! The Type Registry: maps a type name to the contract it implements.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Result, WantError};
use crate::want::ConnectivityDescriptor;

/// Inputs available to a step function invocation: the current input
/// handles (one `SubscriptionHandle` per resolved `using` match, in
/// selector-match order) are owned by the node runtime; the step function
/// instead receives already-drained input payloads plus the output topics
/// to publish to.
pub struct StepContext<'a> {
    pub want_id: &'a str,
    pub params: &'a std::collections::BTreeMap<String, crate::value::Value>,
    pub inputs: &'a [Vec<crate::value::Value>],
    pub state: &'a crate::want::WantState,
}

/// The result of a single step invocation.
pub struct StepOutcome {
    /// Payloads to publish, one list per output (a want has exactly one
    /// output topic, its own id; multiple payloads may be emitted per tick).
    pub outputs: Vec<crate::value::Value>,
    /// A log line to append to history, if any.
    pub log: Option<String>,
    /// Whether the step function considers its work for this want complete.
    pub done: bool,
}

impl StepOutcome {
    pub fn continue_with(outputs: Vec<crate::value::Value>) -> Self {
        Self {
            outputs,
            log: None,
            done: false,
        }
    }

    pub fn finished(outputs: Vec<crate::value::Value>) -> Self {
        Self {
            outputs,
            log: None,
            done: true,
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }
}

/// A type's step function: synchronous, called once per tick by the runtime.
pub type StepFn = Arc<dyn Fn(&StepContext<'_>) -> Result<StepOutcome> + Send + Sync>;

/// An optional hook producing a type's initial state.
pub type StateInitFn = Arc<dyn Fn() -> crate::value::Value + Send + Sync>;

/// A registered want type: its connectivity contract and step function.
#[derive(Clone)]
pub struct WantTypeEntry {
    pub name: String,
    pub connectivity: ConnectivityDescriptor,
    pub step: StepFn,
    pub state_init: Option<StateInitFn>,
    /// Whether a wake-up restart resets state to `state_init()` rather
    /// than preserving it, per spec §9 open question (a).
    pub reset_state_on_restart: bool,
}

impl std::fmt::Debug for WantTypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WantTypeEntry")
            .field("name", &self.name)
            .field("connectivity", &self.connectivity)
            .field("reset_state_on_restart", &self.reset_state_on_restart)
            .finish()
    }
}

/// A process-wide, read-after-bootstrap table of `type name -> contract`.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    entries: Arc<DashMap<String, WantTypeEntry>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Called during orchestrator bootstrap, before any
    /// graph is built.
    pub fn register(&self, entry: WantTypeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, type_name: &str) -> Result<WantTypeEntry> {
        self.entries
            .get(type_name)
            .map(|e| e.clone())
            .ok_or_else(|| WantError::Validation(format!("unknown want type '{type_name}'")))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }
}
