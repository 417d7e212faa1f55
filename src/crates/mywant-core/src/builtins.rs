//! A small built-in want type library: `numbers`, `queue`, `sink`.
//!
//! These exist so an embedding binary (`mywant-server`'s bootstrap, or a
//! test) has something to register without writing its own step functions
//! for the common "generate → queue → consume" shape used throughout the
//! end-to-end scenarios.

use std::sync::Arc;

use crate::registry::{StepContext, StepOutcome, WantTypeEntry};
use crate::value::Value;
use crate::want::ConnectivityDescriptor;

const UNBOUNDED: i32 = ConnectivityDescriptor::UNBOUNDED;

/// Register `numbers`, `queue`, and `sink` on `registry`.
pub fn register_all(registry: &crate::registry::TypeRegistry) {
    registry.register(numbers());
    registry.register(queue());
    registry.register(sink());
}

/// A source: emits `0..params.count` as `Value::Int`, one per tick, then
/// finishes. `params.rate` is accepted but only recorded, since step
/// functions are synchronous and ticks are driven by the runtime loop
/// rather than wall-clock timers. The emit cursor lives in the want's own
/// state bag, not in the closure, so every `numbers` instance counts
/// independently.
pub fn numbers() -> WantTypeEntry {
    WantTypeEntry {
        name: "numbers".to_string(),
        connectivity: ConnectivityDescriptor {
            required_in: 0,
            required_out: 1,
            max_in: 0,
            max_out: UNBOUNDED,
        },
        step: Arc::new(|ctx: &StepContext<'_>| {
            let count = ctx.params.get("count").and_then(Value::as_i64).unwrap_or(0);
            let mut n = 0;
            ctx.state.update(|state| {
                n = state.map_get("next").and_then(Value::as_i64).unwrap_or(0);
                state.map_insert("next", Value::Int(n + 1));
            });
            if n >= count {
                Ok(StepOutcome::finished(vec![]))
            } else {
                Ok(StepOutcome::continue_with(vec![Value::Int(n)]))
            }
        }),
        state_init: None,
        reset_state_on_restart: false,
    }
}

/// A single-server queue: forwards every input payload downstream after
/// accounting for `params.service_time` in its running `average_wait_time`,
/// and tallies `total_processed`.
pub fn queue() -> WantTypeEntry {
    WantTypeEntry {
        name: "queue".to_string(),
        connectivity: ConnectivityDescriptor {
            required_in: 1,
            required_out: 1,
            max_in: 1,
            max_out: UNBOUNDED,
        },
        step: Arc::new(|ctx: &StepContext<'_>| {
            let service_time = ctx
                .params
                .get("service_time")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let received = ctx.inputs.first().map(|v| v.as_slice()).unwrap_or(&[]);
            if received.is_empty() {
                return Ok(StepOutcome::continue_with(vec![]));
            }

            let mut outputs = Vec::with_capacity(received.len());
            ctx.state.update(|state| {
                let mut total = state.map_get("total_processed").and_then(Value::as_i64).unwrap_or(0);
                let mut wait_sum = state
                    .map_get("total_wait_time")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);

                for payload in received {
                    total += 1;
                    // A single-server FIFO queue's expected wait grows with
                    // how many requests are already ahead of it.
                    wait_sum += service_time * total as f64;
                    outputs.push(payload.clone());
                }

                let average_wait = if total > 0 { wait_sum / total as f64 } else { 0.0 };
                state.map_insert("total_processed", Value::Int(total));
                state.map_insert("total_wait_time", Value::Float(wait_sum));
                state.map_insert("average_wait_time", Value::Float(average_wait));
            });

            Ok(StepOutcome::continue_with(outputs))
        }),
        state_init: None,
        reset_state_on_restart: false,
    }
}

/// A terminal consumer: counts everything it receives, emits nothing.
pub fn sink() -> WantTypeEntry {
    WantTypeEntry {
        name: "sink".to_string(),
        connectivity: ConnectivityDescriptor {
            required_in: 1,
            required_out: 0,
            max_in: 1,
            max_out: 0,
        },
        step: Arc::new(|ctx: &StepContext<'_>| {
            let received = ctx.inputs.first().map(|v| v.len()).unwrap_or(0);
            if received > 0 {
                ctx.state.update(|state| {
                    let total = state.map_get("total_processed").and_then(Value::as_i64).unwrap_or(0);
                    state.map_insert("total_processed", Value::Int(total + received as i64));
                });
            }
            Ok(StepOutcome::continue_with(vec![]))
        }),
        state_init: None,
        reset_state_on_restart: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::Fabric;
    use crate::runtime;
    use crate::want::{Want, WantMetadata, WantSpec, WantStatus};
    use parking_lot::RwLock;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn want(name: &str, type_name: &str, params: BTreeMap<String, Value>) -> Arc<RwLock<Want>> {
        Arc::new(RwLock::new(Want::new(
            WantMetadata {
                id: name.to_string(),
                name: name.to_string(),
                type_name: type_name.to_string(),
                labels: Default::default(),
                owner_references: vec![],
            },
            WantSpec {
                params,
                ..Default::default()
            },
        )))
    }

    #[tokio::test]
    async fn numbers_queue_sink_pipeline_processes_everything() {
        let fabric = Arc::new(Fabric::default());

        let mut numbers_params = BTreeMap::new();
        numbers_params.insert("count".to_string(), Value::Int(10));
        let source = want("numbers", "numbers", numbers_params);

        let mut queue_params = BTreeMap::new();
        queue_params.insert("service_time".to_string(), Value::Float(0.1));
        let mid = want("queue", "queue", queue_params);

        let sink_want = want("sink", "sink", BTreeMap::new());

        let source_task = runtime::spawn(source.clone(), numbers(), fabric.clone(), vec![]);
        let queue_task = runtime::spawn(
            mid.clone(),
            queue(),
            fabric.clone(),
            vec!["numbers".to_string()],
        );
        let sink_task = runtime::spawn(
            sink_want.clone(),
            sink(),
            fabric,
            vec!["queue".to_string()],
        );

        tokio::time::timeout(Duration::from_secs(2), source_task.join)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), queue_task.join)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), sink_task.join)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sink_want.read().status, WantStatus::Achieved);
        assert_eq!(
            sink_want.read().state.get().map_get("total_processed").and_then(|v| v.as_i64()),
            Some(10)
        );
        let queue_state = mid.read().state.get();
        assert_eq!(queue_state.map_get("total_processed").and_then(|v| v.as_i64()), Some(10));
        assert!(queue_state.map_get("average_wait_time").and_then(|v| v.as_f64()).unwrap() >= 0.0);
    }
}
