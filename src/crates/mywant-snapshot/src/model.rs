//! The persisted shape of a single want, and of the snapshot file as a whole.
//!
//! Mirrors spec §4.7/§3: a snapshot is a map of want id to
//! `{metadata, spec, status, state, history}`. This crate treats all four
//! of those fields as opaque JSON so that `mywant-snapshot` has no
//! dependency on `mywant-core`'s types — `mywant-core` converts to/from
//! this record at the point it calls into a [`crate::SnapshotStore`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One want's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotRecord {
    /// `Want.metadata` (id, name, type, labels, owner references), as JSON.
    pub metadata: serde_json::Value,
    /// `Want.spec` (params, using, recipe), as JSON.
    pub spec: serde_json::Value,
    /// `Want.status` at the time of the snapshot.
    pub status: String,
    /// `Want.state`, the live mutable state bag.
    pub state: serde_json::Value,
    /// `Want.history`, the full chronological event log.
    pub history: serde_json::Value,
}

/// A full snapshot: every tracked want's id mapped to its record.
pub type Snapshot = HashMap<String, SnapshotRecord>;
