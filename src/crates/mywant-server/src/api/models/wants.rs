//! Want API request/response DTOs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mywant_core::{HistoryEntry, OwnerReference, Want, WantStatus};

/// A want as rendered over HTTP: the live fields a [`Want`] carries,
/// flattened into a serializable shape (`Want` itself isn't `Serialize` —
/// its state bag is a shared, lock-guarded handle, not a plain value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WantResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "ownerReferences")]
    pub owner_references: Vec<OwnerReference>,
    pub params: BTreeMap<String, serde_json::Value>,
    pub using: Vec<BTreeMap<String, String>>,
    pub status: WantStatus,
    pub state: serde_json::Value,
    pub history: Vec<HistoryEntry>,
}

impl From<&Want> for WantResponse {
    fn from(want: &Want) -> Self {
        Self {
            id: want.id().to_string(),
            name: want.metadata.name.clone(),
            type_name: want.metadata.type_name.clone(),
            labels: want.metadata.labels.clone(),
            owner_references: want.metadata.owner_references.clone(),
            params: want
                .spec
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
            using: want.spec.using.clone(),
            status: want.status,
            state: want.state.get().into(),
            history: want.history.clone(),
        }
    }
}

/// `POST /wants` response body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateWantsResponse {
    pub want_ids: Vec<String>,
}

/// `GET /wants/{id}/status` response body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: WantStatus,
    pub suspended: bool,
}

/// `POST /wants/{id}/suspend` and `.../resume` response body.
#[derive(Debug, Clone, Serialize)]
pub struct SuspendedResponse {
    pub suspended: bool,
}

/// Query parameters accepted by `GET /wants`: `type`, repeatable `label`,
/// repeatable `using`, each `k=v`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListWantsQuery {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub label: Vec<String>,
    #[serde(default)]
    pub using: Vec<String>,
}

impl ListWantsQuery {
    /// Parse this query's repeated `k=v` label/using pairs into a
    /// [`mywant_core::ListFilter`], rejecting entries without an `=`.
    pub fn into_filter(self) -> Result<mywant_core::ListFilter, String> {
        Ok(mywant_core::ListFilter {
            type_name: self.type_name,
            labels: parse_pairs(&self.label)?,
            using: parse_pairs(&self.using)?,
        })
    }
}

fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| format!("'{pair}' is not a k=v pair"))?;
        map.insert(k.to_string(), v.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_kv_pairs() {
        let query = ListWantsQuery {
            type_name: Some("sink".into()),
            label: vec!["role=source".into()],
            using: vec![],
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.type_name.as_deref(), Some("sink"));
        assert_eq!(filter.labels.get("role").map(String::as_str), Some("source"));
    }

    #[test]
    fn rejects_a_pair_without_equals() {
        let query = ListWantsQuery {
            type_name: None,
            label: vec!["not-a-pair".into()],
            using: vec![],
        };
        assert!(query.into_filter().is_err());
    }
}
