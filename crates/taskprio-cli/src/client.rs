//! HTTP client for the TaskPrio REST API.

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use taskprio_core::TaskId;

use crate::error::ClientError;

/// One task in a batch or conditional update result.
#[derive(Debug, Deserialize)]
pub struct UpdatedTask {
    pub task_id: TaskId,
    pub old_priority: i32,
    pub new_priority: i32,
}

/// One task a batch update could not touch.
#[derive(Debug, Deserialize)]
pub struct FailedTask {
    pub task_id: TaskId,
    pub error: String,
}

/// Batch or conditional update result.
#[derive(Debug, Deserialize)]
pub struct BatchResult {
    pub succeeded: Vec<UpdatedTask>,
    pub failed: Vec<FailedTask>,
    pub summary: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for REST API endpoints.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            inner: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.inner.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(message));
            }
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Check if the server is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.url("/health", &[])?;
        debug!(url = %url, "Checking health");

        let response = self.inner.get(url).send().await?;
        Ok(response.status().is_success())
    }

    /// Get JSON from an endpoint.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.send::<(), T>(Method::GET, path, query, None).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::DELETE, path, &[], None).await
    }
}
