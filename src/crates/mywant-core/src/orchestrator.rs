//! The Chain Builder: owns every want, starts/stops/restarts their tasks,
//! and drives the owner cascade, parameter-update protocol, and
//! termination detection described in spec §4.5.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, WantConfig};
use crate::connectivity;
use crate::error::{Result, WantError};
use crate::fabric::Fabric;
use crate::registry::TypeRegistry;
use crate::runtime::{self, RuntimeHandles};
use crate::value::Value;
use crate::want::{Want, WantStatus};

/// How long `update`/`delete`/shutdown wait for a running task to exit
/// before giving up on a clean stop, per spec §5.
const CANCEL_DEADLINE: Duration = Duration::from_secs(5);

struct WantHandle {
    want: Arc<SyncRwLock<Want>>,
    inputs: Vec<String>,
    type_name: String,
    /// The supervisor's root cancellation token; cancelling it stops both
    /// any live task and a parked (post-`Achieved`) wait for wake-up.
    stop_token: CancellationToken,
    /// Handles of whichever execution attempt is currently live, if any.
    control: Arc<SyncRwLock<Option<RuntimeHandles>>>,
    /// Fires to wake a parked, `Achieved` want: a parameter update, or an
    /// owner-restart cascade.
    wake: Arc<Notify>,
    /// Sticky across restarts: a suspend requested while no task was live
    /// still applies to the next spawned attempt.
    suspend_requested: Arc<AtomicBool>,
    /// Set when a child of this want restarts; cleared when this want is
    /// woken because of it. Drives "parent restarts if any child had been
    /// restarted since its last completion" (spec §4.5).
    children_dirty: Arc<AtomicBool>,
    /// Set by `update_inner` immediately before cancelling a live task for
    /// a `Reaching`/`Suspended` restart, and consumed by `supervise`'s loop
    /// right after the cancelled task's `join` resolves. Lets the one true
    /// supervisor loop relaunch in place instead of a second task racing it
    /// (see the `update_inner` restart protocol below).
    restart_requested: Arc<AtomicBool>,
    /// Wrapped for interior mutability so `delete`/`update` can replace it
    /// through an immutable `DashMap` `Ref` (see `respawn_supervisor`).
    supervisor: Arc<SyncRwLock<tokio::task::JoinHandle<()>>>,
}

/// Owns the type registry, fabric, and every want's lifecycle.
pub struct Orchestrator {
    registry: TypeRegistry,
    fabric: Arc<Fabric>,
    wants: Arc<DashMap<String, WantHandle>>,
}

/// Filters accepted by [`Orchestrator::list`], matching spec §6's `GET /wants`.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub type_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub using: BTreeMap<String, String>,
}

impl Orchestrator {
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_fabric(registry, Arc::new(Fabric::default()))
    }

    pub fn with_fabric(registry: TypeRegistry, fabric: Arc<Fabric>) -> Self {
        Self {
            registry,
            fabric,
            wants: Arc::new(DashMap::new()),
        }
    }

    pub fn fabric(&self) -> Arc<Fabric> {
        self.fabric.clone()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Validate and launch every want in `config`, resolving connectivity
    /// against both the new wants and every want already in the graph.
    pub fn create(&self, config: Config) -> Result<Vec<String>> {
        let mut new_wants: Vec<Want> = config
            .wants
            .into_iter()
            .map(|w| Want::new(w.metadata, w.spec))
            .collect();

        let existing: Vec<Want> = self.wants.iter().map(|e| e.want.read().clone()).collect();

        for want in &new_wants {
            let duplicate = existing
                .iter()
                .chain(new_wants.iter())
                .filter(|w| w.id() != want.id())
                .any(|w| w.metadata.name == want.metadata.name && w.metadata.type_name == want.metadata.type_name);
            if duplicate {
                return Err(WantError::Validation(format!(
                    "name '{}' + type '{}' is not unique in the active graph",
                    want.metadata.name, want.metadata.type_name
                )));
            }
        }

        let mut combined = existing.clone();
        combined.extend(new_wants.iter().cloned());
        assert_owner_acyclic(&combined)?;

        let graph = connectivity::resolve(&combined, &self.registry)?;

        let ids: Vec<String> = new_wants.iter().map(|w| w.id().to_string()).collect();
        for mut want in new_wants.drain(..) {
            let id = want.id().to_string();
            let type_name = want.metadata.type_name.clone();
            let inputs = graph.inputs_for(&id).to_vec();
            if let Ok(entry) = self.registry.get(&type_name) {
                if let Some(state_init) = entry.state_init.as_ref() {
                    want.state.set(state_init());
                }
            }
            let want = Arc::new(SyncRwLock::new(want));
            let handle = WantHandle {
                want: want.clone(),
                inputs: inputs.clone(),
                type_name: type_name.clone(),
                stop_token: CancellationToken::new(),
                control: Arc::new(SyncRwLock::new(None)),
                wake: Arc::new(Notify::new()),
                suspend_requested: Arc::new(AtomicBool::new(false)),
                children_dirty: Arc::new(AtomicBool::new(false)),
                restart_requested: Arc::new(AtomicBool::new(false)),
                supervisor: Arc::new(SyncRwLock::new(tokio::spawn(std::future::pending::<()>()))),
            };
            self.insert_and_supervise(id.clone(), handle, want, type_name, inputs);
        }

        Ok(ids)
    }

    fn insert_and_supervise(
        &self,
        id: String,
        handle: WantHandle,
        want: Arc<SyncRwLock<Want>>,
        type_name: String,
        inputs: Vec<String>,
    ) {
        handle.supervisor.read().abort();

        let registry = self.registry.clone();
        let fabric = self.fabric.clone();
        let wants = self.wants.clone();
        let stop_token = handle.stop_token.clone();
        let control = handle.control.clone();
        let wake = handle.wake.clone();
        let suspend_requested = handle.suspend_requested.clone();
        let restart_requested = handle.restart_requested.clone();
        let id_for_task = id.clone();

        let supervisor = tokio::spawn(async move {
            supervise(
                id_for_task,
                want,
                type_name,
                inputs,
                registry,
                fabric,
                wants,
                stop_token,
                control,
                wake,
                suspend_requested,
                restart_requested,
            )
            .await;
        });
        *handle.supervisor.write() = supervisor;
        self.wants.insert(id, handle);
    }

    /// Resurrects a want whose supervisor has already permanently exited
    /// (status `Stopped`, parked nowhere) by spawning a brand-new
    /// `supervise` task in its place, mirroring `insert_and_supervise`.
    /// Used by `update_inner` for a `Stopped` want, where there is no live
    /// supervisor left to flag or notify.
    fn respawn_supervisor(&self, id: &str) {
        let Some(handle) = self.wants.get(id) else {
            return;
        };
        handle.supervisor.read().abort();

        let registry = self.registry.clone();
        let fabric = self.fabric.clone();
        let wants = self.wants.clone();
        let stop_token = handle.stop_token.clone();
        let control = handle.control.clone();
        let wake = handle.wake.clone();
        let suspend_requested = handle.suspend_requested.clone();
        let restart_requested = handle.restart_requested.clone();
        let want = handle.want.clone();
        let type_name = handle.type_name.clone();
        let inputs = handle.inputs.clone();
        let id_for_task = id.to_string();

        let supervisor = tokio::spawn(async move {
            supervise(
                id_for_task,
                want,
                type_name,
                inputs,
                registry,
                fabric,
                wants,
                stop_token,
                control,
                wake,
                suspend_requested,
                restart_requested,
            )
            .await;
        });
        *handle.supervisor.write() = supervisor;
    }

    pub fn get(&self, id: &str) -> Result<Want> {
        self.wants
            .get(id)
            .map(|h| h.want.read().clone())
            .ok_or_else(|| WantError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &ListFilter) -> Vec<Want> {
        self.wants
            .iter()
            .map(|h| h.want.read().clone())
            .filter(|w| {
                filter
                    .type_name
                    .as_ref()
                    .map(|t| &w.metadata.type_name == t)
                    .unwrap_or(true)
            })
            .filter(|w| filter.labels.iter().all(|(k, v)| w.metadata.labels.get(k) == Some(v)))
            .filter(|w| {
                if filter.using.is_empty() {
                    return true;
                }
                w.spec
                    .using
                    .iter()
                    .any(|selector| filter.using.iter().all(|(k, v)| selector.get(k) == Some(v)))
            })
            .collect()
    }

    /// Parameter-update protocol, spec §4.5, steps 1-6.
    pub fn update(&self, id: &str, new_params: BTreeMap<String, Value>) -> Result<()> {
        self.update_inner(id, new_params, &mut Vec::new())
    }

    fn update_inner(
        &self,
        id: &str,
        new_params: BTreeMap<String, Value>,
        visiting: &mut Vec<String>,
    ) -> Result<()> {
        if visiting.contains(&id.to_string()) {
            return Ok(());
        }
        visiting.push(id.to_string());

        // Clone out everything we need and drop the DashMap guard before
        // doing a second `self.wants` lookup below — holding a `Ref` while
        // iterating the same map risks a shard-lock deadlock.
        let mut resurrect = false;
        {
            let handle = self
                .wants
                .get(id)
                .ok_or_else(|| WantError::NotFound(id.to_string()))?;
            let mut w = handle.want.write();
            let old = w.spec.params.clone();
            let mut merged = old.clone();
            for (k, v) in &new_params {
                merged.insert(k.clone(), v.clone());
            }
            w.spec.params = merged.clone();
            w.record_param_change(old, merged);
            let status = w.status;
            drop(w);

            match status {
                WantStatus::Reaching => {
                    // The live task will exit (cancelled) and the
                    // supervisor's own loop would otherwise see the
                    // now-`Stopped` status and quit for good; flagging the
                    // restart first makes it relaunch in place instead.
                    handle.restart_requested.store(true, Ordering::SeqCst);
                    self.stop_and_wait(&handle);
                }
                WantStatus::Suspended => {
                    handle.suspend_requested.store(false, Ordering::SeqCst);
                    handle.restart_requested.store(true, Ordering::SeqCst);
                    self.stop_and_wait(&handle);
                }
                WantStatus::Achieved | WantStatus::Idle => {
                    // The supervisor is either parked in `wait_for_wake`
                    // (Achieved) or about to finish its first attempt
                    // (Idle); either way it relaunches on its own.
                    handle.wake.notify_one();
                }
                WantStatus::Stopped => {
                    resurrect = true;
                }
                WantStatus::Failed => {}
            }
        }
        if resurrect {
            self.respawn_supervisor(id);
        }

        let children: Vec<String> = self
            .wants
            .iter()
            .filter(|e| {
                e.want
                    .read()
                    .metadata
                    .owner_references
                    .iter()
                    .any(|o| o.owner_id == id)
            })
            .map(|e| e.key().clone())
            .collect();

        for child_id in children {
            self.update_inner(&child_id, new_params.clone(), visiting)?;
        }

        Ok(())
    }

    /// Blocking; the public lifecycle API (`update`, `delete`, ...) is
    /// synchronous by design, matching the teacher's handler style of
    /// keeping orchestration state changes off the async executor via
    /// `spawn_blocking` at the HTTP layer. Waits for a cancelled task to
    /// actually exit, up to [`CANCEL_DEADLINE`].
    fn stop_and_wait(&self, handle: &WantHandle) {
        if let Some(control) = handle.control.read().clone() {
            control.stop();
        }
        let control = handle.control.clone();
        let start = std::time::Instant::now();
        while control.read().is_some() && start.elapsed() < CANCEL_DEADLINE {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Cooperative; checked at the step boundary. Idempotent.
    pub fn suspend(&self, id: &str) -> Result<()> {
        let handle = self
            .wants
            .get(id)
            .ok_or_else(|| WantError::NotFound(id.to_string()))?;
        handle.suspend_requested.store(true, Ordering::SeqCst);
        if let Some(control) = handle.control.read().clone() {
            control.suspend();
        }
        Ok(())
    }

    /// Idempotent.
    pub fn resume(&self, id: &str) -> Result<()> {
        let handle = self
            .wants
            .get(id)
            .ok_or_else(|| WantError::NotFound(id.to_string()))?;
        handle.suspend_requested.store(false, Ordering::SeqCst);
        if let Some(control) = handle.control.read().clone() {
            control.resume();
        } else {
            handle.wake.notify_one();
        }
        Ok(())
    }

    /// Permitted only when the want is not `Reaching`; 409 otherwise.
    pub fn delete(&self, id: &str) -> Result<()> {
        let status = self
            .wants
            .get(id)
            .map(|h| h.want.read().status)
            .ok_or_else(|| WantError::NotFound(id.to_string()))?;
        if status == WantStatus::Reaching {
            return Err(WantError::Conflict(format!(
                "want '{id}' is reaching; stop it before deleting"
            )));
        }
        if let Some((_, handle)) = self.wants.remove(id) {
            handle.stop_token.cancel();
            handle.supervisor.read().abort();
            self.fabric.remove_topic(id);
        }
        Ok(())
    }

    /// Cancels every want's execution and closes the fabric.
    pub fn shutdown(&self) {
        for entry in self.wants.iter() {
            entry.stop_token.cancel();
        }
        self.fabric.close();
    }

    /// The graph is "complete" when every non-`Failed`/non-`Stopped` want
    /// is `Achieved`.
    pub fn is_complete(&self) -> bool {
        self.wants.iter().all(|h| {
            let status = h.want.read().status;
            status.is_terminal() || status.is_achieved()
        })
    }

    /// A serializable dump of every want, for the snapshot writer.
    pub fn snapshot_wants(&self) -> Vec<Want> {
        self.wants.iter().map(|h| h.want.read().clone()).collect()
    }
}

fn assert_owner_acyclic(wants: &[Want]) -> Result<()> {
    use std::collections::HashSet;

    fn visit<'a>(
        id: &'a str,
        by_id: &std::collections::HashMap<&'a str, &'a Want>,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if done.contains(id) {
            return Ok(());
        }
        if !visiting.insert(id) {
            return Err(WantError::Validation(format!(
                "owner reference cycle detected at want '{id}'"
            )));
        }
        if let Some(want) = by_id.get(id) {
            for owner in &want.metadata.owner_references {
                visit(&owner.owner_id, by_id, visiting, done)?;
            }
        }
        visiting.remove(id);
        done.insert(id);
        Ok(())
    }

    let by_id: std::collections::HashMap<&str, &Want> =
        wants.iter().map(|w| (w.id(), w)).collect();
    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    for want in wants {
        visit(want.id(), &by_id, &mut visiting, &mut done)?;
    }
    Ok(())
}

/// Runs once per want's lifetime: launches its first attempt, then, every
/// time an attempt ends in `Achieved`, parks until a wake-up trigger fires
/// and relaunches. Exits when an attempt ends `Failed`/`Stopped`, or when
/// `stop_token` is cancelled while parked. A `Reaching`/`Suspended`
/// parameter-update restart (see `Orchestrator::update_inner`) also routes
/// through here: `update_inner` flags `restart_requested` and cancels the
/// live attempt, and this loop relaunches in place rather than letting a
/// second task spawn alongside it.
#[allow(clippy::too_many_arguments)]
async fn supervise(
    id: String,
    want: Arc<SyncRwLock<Want>>,
    type_name: String,
    inputs: Vec<String>,
    registry: TypeRegistry,
    fabric: Arc<Fabric>,
    wants: Arc<DashMap<String, WantHandle>>,
    stop_token: CancellationToken,
    control: Arc<SyncRwLock<Option<RuntimeHandles>>>,
    wake: Arc<Notify>,
    suspend_requested: Arc<AtomicBool>,
    restart_requested: Arc<AtomicBool>,
) {
    let entry = match registry.get(&type_name) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(id, error = %err, "want could not be started");
            return;
        }
    };

    loop {
        if stop_token.is_cancelled() {
            return;
        }
        let task = runtime::spawn_under(
            want.clone(),
            entry.clone(),
            fabric.clone(),
            inputs.clone(),
            &stop_token,
            suspend_requested.load(Ordering::SeqCst),
        );
        *control.write() = Some(task.handles.clone());
        let _ = task.join.await;
        *control.write() = None;

        // A parameter-update restart cancelled the attempt we just joined
        // on purpose; relaunch unconditionally rather than trusting the
        // status the cancellation tail stamped (it cannot tell a deliberate
        // restart from real teardown, so it always stamps `Stopped`).
        if restart_requested.swap(false, Ordering::SeqCst) {
            if stop_token.is_cancelled() {
                return;
            }
            reset_state_if_configured(&want, &entry);
            want.write().record_status(WantStatus::Reaching);
            continue;
        }

        if stop_token.is_cancelled() {
            return;
        }

        let status = want.read().status;
        if status.is_terminal() {
            return;
        }
        if !status.is_achieved() {
            // Suspended resumed into Reaching without the task seeing it
            // through to completion (shouldn't normally happen); loop and
            // retry rather than getting stuck.
            continue;
        }

        notify_owner_if_idle(&id, &want, &wants);
        wait_for_wake(&id, &inputs, &wake, &fabric, &stop_token).await;
        if stop_token.is_cancelled() {
            return;
        }
        mark_owner_dirty(&want, &wants);
        reset_state_if_configured(&want, &entry);
        let mut w = want.write();
        w.record_status(WantStatus::Reaching);
    }
}

/// Resets a want's state bag to `entry.state_init()` (or an empty map if
/// the type has none) immediately before a restart, when the type has
/// opted into `reset_state_on_restart`; otherwise leaves state untouched so
/// it carries over across the restart, per spec §9 open question (a).
fn reset_state_if_configured(want: &Arc<SyncRwLock<Want>>, entry: &crate::registry::WantTypeEntry) {
    if !entry.reset_state_on_restart {
        return;
    }
    let fresh = entry.state_init.as_ref().map(|init| init()).unwrap_or_else(Value::empty_map);
    want.read().state.set(fresh);
}

/// Having just achieved, tell our owner (if any) in case all its children
/// are now done and it was waiting on us.
fn notify_owner_if_idle(id: &str, want: &Arc<SyncRwLock<Want>>, wants: &DashMap<String, WantHandle>) {
    let owner_id = match want.read().metadata.owner_references.first() {
        Some(o) => o.owner_id.clone(),
        None => return,
    };
    // Clone the owner's wake handles out and drop its guard before
    // iterating — holding a `Ref` across `wants.iter()` risks a shard-lock
    // deadlock against itself.
    let (owner_dirty, owner_wake) = {
        let Some(owner) = wants.get(&owner_id) else {
            return;
        };
        (owner.children_dirty.clone(), owner.wake.clone())
    };

    let siblings_done = wants
        .iter()
        .filter(|e| {
            e.want
                .read()
                .metadata
                .owner_references
                .iter()
                .any(|o| o.owner_id == owner_id)
        })
        .all(|e| e.want.read().status.is_achieved());

    if siblings_done && owner_dirty.swap(false, Ordering::SeqCst) {
        info!(id, owner_id, "all children achieved after a restart, waking owner");
        owner_wake.notify_one();
    }
}

/// Tell our owner that we are about to restart, so it knows to wake once
/// every child (including us) has achieved again.
fn mark_owner_dirty(want: &Arc<SyncRwLock<Want>>, wants: &DashMap<String, WantHandle>) {
    let owner_id = match want.read().metadata.owner_references.first() {
        Some(o) => o.owner_id.clone(),
        None => return,
    };
    if let Some(owner) = wants.get(&owner_id) {
        owner.children_dirty.store(true, Ordering::SeqCst);
    }
}

/// Park until a parameter update (`wake.notify_one()`) or a fresh payload
/// arrives on one of our inputs, whichever comes first.
async fn wait_for_wake(
    id: &str,
    inputs: &[String],
    wake: &Notify,
    fabric: &Fabric,
    stop_token: &CancellationToken,
) {
    if inputs.is_empty() {
        // No topics to subscribe to; selecting on a channel with zero
        // senders would resolve immediately (a closed channel's `recv`
        // returns `None` right away), defeating the park entirely.
        tokio::select! {
            _ = wake.notified() => {}
            _ = stop_token.cancelled() => {}
        }
        return;
    }

    let consumer_id = format!("{id}::wake");
    let (tx, mut merged_rx) = tokio::sync::mpsc::channel::<()>(1);
    let mut forwarders = Vec::new();
    for topic in inputs {
        if let Ok(mut sub) = fabric.subscribe(topic, &consumer_id) {
            let tx = tx.clone();
            forwarders.push(tokio::spawn(async move {
                if sub.recv().await.is_some() {
                    let _ = tx.send(()).await;
                }
            }));
        }
    }
    drop(tx);

    tokio::select! {
        _ = wake.notified() => {}
        _ = stop_token.cancelled() => {}
        _ = merged_rx.recv() => {}
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
}
