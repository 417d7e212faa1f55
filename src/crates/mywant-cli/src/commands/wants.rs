//! `mywant wants ...` subcommand implementations.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::client::Client;

pub async fn list(
    client: &Client,
    type_name: Option<String>,
    labels: BTreeMap<String, String>,
    using: BTreeMap<String, String>,
) -> Result<()> {
    let mut path = "/api/v1/wants".to_string();
    let mut query = Vec::new();
    if let Some(t) = &type_name {
        query.push(format!("type={t}"));
    }
    for (k, v) in &labels {
        query.push(format!("label={k}={v}"));
    }
    for (k, v) in &using {
        query.push(format!("using={k}={v}"));
    }
    if !query.is_empty() {
        path.push('?');
        path.push_str(&query.join("&"));
    }

    let body: Value = client.get(&path).await?;
    print_json(&body);
    Ok(())
}

pub async fn get(client: &Client, id: &str) -> Result<()> {
    let body: Value = client.get(&format!("/api/v1/wants/{id}")).await?;
    print_json(&body);
    Ok(())
}

pub async fn create(client: &Client, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let content_type = if is_yaml(file) { "application/yaml" } else { "application/json" };
    let body: Value = client.post_body("/api/v1/wants", content_type, bytes).await?;
    print_json(&body);
    Ok(())
}

pub async fn export(client: &Client, output: Option<std::path::PathBuf>) -> Result<()> {
    let listed: Value = client.get("/api/v1/wants").await?;
    let wants = listed["wants"].as_array().cloned().unwrap_or_default();

    let config_wants: Vec<Value> = wants
        .into_iter()
        .map(|w| {
            serde_json::json!({
                "metadata": {
                    "id": w["id"],
                    "name": w["name"],
                    "type": w["type"],
                    "labels": w["labels"],
                    "ownerReferences": w["ownerReferences"],
                },
                "spec": {
                    "params": w["params"],
                    "using": w["using"],
                },
            })
        })
        .collect();
    let config = serde_json::json!({ "wants": config_wants });
    let rendered = serde_json::to_string_pretty(&config)?;

    match output {
        Some(path) => std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

pub async fn delete(client: &Client, id: &str) -> Result<()> {
    client.delete(&format!("/api/v1/wants/{id}")).await?;
    println!("deleted {id}");
    Ok(())
}

pub async fn suspend(client: &Client, id: &str) -> Result<()> {
    let body: Value = client.post_empty(&format!("/api/v1/wants/{id}/suspend")).await?;
    print_json(&body);
    Ok(())
}

pub async fn resume(client: &Client, id: &str) -> Result<()> {
    let body: Value = client.post_empty(&format!("/api/v1/wants/{id}/resume")).await?;
    print_json(&body);
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{value}"),
    }
}
