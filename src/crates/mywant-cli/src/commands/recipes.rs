//! `mywant recipes ...` subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::client::Client;

pub async fn list(client: &Client) -> Result<()> {
    let body: Value = client.get("/api/v1/recipes").await?;
    print_json(&body);
    Ok(())
}

pub async fn get(client: &Client, name: &str) -> Result<()> {
    let body: Value = client.get(&format!("/api/v1/recipes/{name}")).await?;
    print_json(&body);
    Ok(())
}

pub async fn create(client: &Client, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let request: Value = if matches!(file.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) {
        serde_yaml::from_str(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    let body: Value = client.post_json("/api/v1/recipes", &request).await?;
    print_json(&body);
    Ok(())
}

pub async fn delete(client: &Client, name: &str) -> Result<()> {
    client.delete(&format!("/api/v1/recipes/{name}")).await?;
    println!("deleted recipe '{name}'");
    Ok(())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{value}"),
    }
}
