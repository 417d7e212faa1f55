//! Thin `reqwest` wrapper: one place that knows how to turn a non-2xx
//! response into the API's `{kind, message}` error body.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::into_json(response).await
    }

    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::into_json(response).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.post(self.url(path)).send().await?;
        Self::into_json(response).await
    }

    pub async fn post_body<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await?;
        Self::into_json(response).await
    }

    pub async fn put_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let response = self.http.put(self.url(path)).json(body).send().await?;
        Self::into_json(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.http.delete(self.url(path)).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    async fn into_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn error_from(response: reqwest::Response) -> anyhow::Error {
        let status = response.status();
        match response.json::<ApiErrorBody>().await {
            Ok(body) => anyhow!("{status} {}: {}", body.kind, body.message),
            Err(_) => anyhow!("request failed with status {status}"),
        }
    }
}

#[derive(serde::Deserialize)]
struct ApiErrorBody {
    kind: String,
    message: String,
}
