//! Per-want cooperative scheduler: one execution attempt from `Idle`/
//! `Reaching` through to `Achieved`, `Failed`, `Stopped`, or a `Suspended`
//! park-and-resume loop.
//!
//! Wake-up (the transition back from `Achieved` to `Reaching` with a fresh
//! task) is the orchestrator's responsibility — [`crate::orchestrator`]
//! watches the param-version channel and the want's own input topics and
//! spawns a new [`WantTask`] when either fires.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::fabric::{Envelope, Fabric};
use crate::registry::{StepContext, StepOutcome, WantTypeEntry};
use crate::value::Value;
use crate::want::{Want, WantStatus};

/// The control surface the orchestrator holds onto for a running task.
#[derive(Clone)]
pub struct RuntimeHandles {
    pub cancel: CancellationToken,
    pub suspended: Arc<AtomicBool>,
    pub resume_notify: Arc<Notify>,
}

impl RuntimeHandles {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            suspended: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
        }
    }

    /// Build handles whose cancellation is a child of `parent` — cancelling
    /// `parent` (e.g. the orchestrator's per-want `stop()`) cancels every
    /// execution attempt spawned under it, current and future.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            suspended: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
        }
    }

    /// Cooperative: raises a flag the runtime checks between ticks.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Default for RuntimeHandles {
    fn default() -> Self {
        Self::new()
    }
}

/// One spawned execution attempt for a want.
pub struct WantTask {
    pub handles: RuntimeHandles,
    pub join: tokio::task::JoinHandle<()>,
}

/// Spawn a fresh execution attempt for `want`.
///
/// `inputs` is the resolved list of input topic ids (producer want ids) in
/// selector-match order; subscriptions are opened under `want`'s own id as
/// consumer id, matching spec §3's `(topic, consumer-id)` identity.
pub fn spawn(
    want: Arc<RwLock<Want>>,
    entry: WantTypeEntry,
    fabric: Arc<Fabric>,
    inputs: Vec<String>,
) -> WantTask {
    spawn_under(want, entry, fabric, inputs, &CancellationToken::new(), false)
}

/// Like [`spawn`], but the attempt's cancellation is a child of `parent`
/// and it may start pre-suspended (a suspend request made while the want
/// had no live task still applies once one is spawned).
pub fn spawn_under(
    want: Arc<RwLock<Want>>,
    entry: WantTypeEntry,
    fabric: Arc<Fabric>,
    inputs: Vec<String>,
    parent: &CancellationToken,
    start_suspended: bool,
) -> WantTask {
    let handles = RuntimeHandles::child_of(parent);
    if start_suspended {
        handles.suspend();
    }
    let task_handles = handles.clone();
    let join = tokio::spawn(run(want, entry, fabric, inputs, handles));
    WantTask {
        handles: task_handles,
        join,
    }
}

async fn run(
    want: Arc<RwLock<Want>>,
    entry: WantTypeEntry,
    fabric: Arc<Fabric>,
    inputs: Vec<String>,
    handles: RuntimeHandles,
) {
    let want_id = want.read().id().to_string();
    {
        let mut w = want.write();
        if w.status != WantStatus::Reaching {
            w.record_status(WantStatus::Reaching);
        }
    }

    let (merged_tx, mut merged_rx) = mpsc::channel::<(usize, Envelope)>(64);
    let mut forwarders: Vec<tokio::task::JoinHandle<()>> = Vec::new();
    for (idx, topic) in inputs.iter().enumerate() {
        let mut sub = match fabric.subscribe(topic, &want_id) {
            Ok(sub) => sub,
            Err(err) => {
                fail(&want, &fabric, &format!("subscribe to '{topic}' failed: {err}"));
                for forwarder in forwarders {
                    forwarder.abort();
                }
                return;
            }
        };
        let tx = merged_tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(envelope) = sub.recv().await {
                let done = envelope.done;
                if tx.send((idx, envelope)).await.is_err() || done {
                    break;
                }
            }
        }));
    }
    drop(merged_tx);

    let mut slots: Vec<Vec<Value>> = vec![Vec::new(); inputs.len()];
    let mut closed = vec![false; inputs.len()];
    let mut finalized = false;

    loop {
        if handles.cancel.is_cancelled() {
            break;
        }
        if handles.is_suspended() {
            {
                let mut w = want.write();
                if w.status != WantStatus::Suspended {
                    w.record_status(WantStatus::Suspended);
                }
            }
            tokio::select! {
                _ = handles.resume_notify.notified() => {
                    let mut w = want.write();
                    w.record_status(WantStatus::Reaching);
                }
                _ = handles.cancel.cancelled() => break,
            }
            continue;
        }

        let params = want.read().spec.params.clone();

        if inputs.is_empty() {
            if finalized {
                break;
            }
            let state = want.read().state.clone();
            let ctx = StepContext {
                want_id: &want_id,
                params: &params,
                inputs: &[],
                state: &state,
            };
            match run_step(&entry, &ctx, &want_id) {
                Ok(outcome) => {
                    if publish_and_record(&want, &fabric, &want_id, outcome) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                Err(message) => {
                    fail(&want, &fabric, &message);
                    break;
                }
            }
            continue;
        }

        tokio::select! {
            _ = handles.cancel.cancelled() => break,
            received = merged_rx.recv() => {
                match received {
                    Some((idx, envelope)) => {
                        if envelope.done {
                            closed[idx] = true;
                            if closed.iter().all(|c| *c) {
                                finalized = true;
                                let state = want.read().state.clone();
                                let ctx = StepContext {
                                    want_id: &want_id,
                                    params: &params,
                                    inputs: &slots,
                                    state: &state,
                                };
                                match run_step(&entry, &ctx, &want_id) {
                                    Ok(outcome) => {
                                        finalize(&want, &fabric, &want_id, outcome);
                                        break;
                                    }
                                    Err(message) => {
                                        fail(&want, &fabric, &message);
                                        break;
                                    }
                                }
                            }
                            continue;
                        }
                        slots[idx].push(envelope.payload);
                        let state = want.read().state.clone();
                        let ctx = StepContext {
                            want_id: &want_id,
                            params: &params,
                            inputs: &slots,
                            state: &state,
                        };
                        let result = run_step(&entry, &ctx, &want_id);
                        slots[idx].clear();
                        match result {
                            Ok(outcome) => {
                                if publish_and_record(&want, &fabric, &want_id, outcome) {
                                    break;
                                }
                            }
                            Err(message) => {
                                fail(&want, &fabric, &message);
                                break;
                            }
                        }
                    }
                    None => {
                        if !finalized {
                            finalized = true;
                            let state = want.read().state.clone();
                            let ctx = StepContext {
                                want_id: &want_id,
                                params: &params,
                                inputs: &slots,
                                state: &state,
                            };
                            match run_step(&entry, &ctx, &want_id) {
                                Ok(outcome) => {
                                    finalize(&want, &fabric, &want_id, outcome);
                                }
                                Err(message) => fail(&want, &fabric, &message),
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }

    let mut w = want.write();
    if handles.cancel.is_cancelled() && !w.status.is_terminal() {
        w.record_status(WantStatus::Stopped);
    }
}

/// Runs the (synchronous) step function, catching panics per spec §4.4's
/// failure semantics. The caller is responsible for transitioning the want
/// to `Failed` and publishing DONE using the returned message.
fn run_step(
    entry: &WantTypeEntry,
    ctx: &StepContext<'_>,
    want_id: &str,
) -> Result<StepOutcome, String> {
    match catch_unwind(AssertUnwindSafe(|| (entry.step)(ctx))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => {
            error!(want_id, error = %err, "step function returned an error");
            Err(err.to_string())
        }
        Err(panic) => {
            let message = panic_message(&panic);
            error!(want_id, message, "step function panicked");
            Err(message)
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn fail(want: &Arc<RwLock<Want>>, fabric: &Fabric, message: &str) {
    warn!(message, "want entering failed state");
    let want_id = {
        let mut w = want.write();
        w.record_log(message);
        w.record_status(WantStatus::Failed);
        w.id().to_string()
    };
    let _ = fabric.publish_done(&want_id);
}

/// Publish outputs and DONE (if finished), persist the log line and state,
/// and transition status. Returns `true` if the want reached a terminal
/// `Achieved` status this call.
fn publish_and_record(
    want: &Arc<RwLock<Want>>,
    fabric: &Fabric,
    want_id: &str,
    outcome: StepOutcome,
) -> bool {
    for payload in outcome.outputs {
        if let Err(err) = fabric.publish(want_id, payload) {
            warn!(want_id, error = %err, "publish failed");
        }
    }

    let mut w = want.write();
    if let Some(log) = outcome.log {
        w.record_log(log);
    }

    if outcome.done {
        drop(w);
        let _ = fabric.publish_done(want_id);
        let mut w = want.write();
        w.record_status(WantStatus::Achieved);
        debug!(want_id, "want achieved");
        true
    } else {
        false
    }
}

/// Like [`publish_and_record`], for the call made once a want's inputs have
/// all closed (or, for a source, the zero-input loop already broke out).
/// There's no more input coming either way, so this unconditionally
/// transitions to `Achieved` — a step function has no way to "vote" against
/// finishing once its last tick has run.
fn finalize(want: &Arc<RwLock<Want>>, fabric: &Fabric, want_id: &str, outcome: StepOutcome) {
    for payload in outcome.outputs {
        if let Err(err) = fabric.publish(want_id, payload) {
            warn!(want_id, error = %err, "publish failed");
        }
    }

    let mut w = want.write();
    if let Some(log) = outcome.log {
        w.record_log(log);
    }
    drop(w);

    let _ = fabric.publish_done(want_id);
    let mut w = want.write();
    w.record_status(WantStatus::Achieved);
    debug!(want_id, "want achieved");
}
