//! REST-backed remote service.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use sitesync_engine::EntityId;

use super::{RemoteError, RemoteService};

/// Talks to `{base_url}/{collection}` with JSON bodies.
///
/// - `add` → `POST {base}/{collection}`
/// - `update` → `PUT {base}/{collection}/{id}`
/// - `delete` → `DELETE {base}/{collection}/{id}`
#[derive(Debug, Clone)]
pub struct RestService {
    client: Client,
    collection_url: String,
    token: Option<String>,
}

/// Optional body of a create response.
#[derive(Debug, Deserialize)]
struct Created {
    id: Option<Value>,
}

impl RestService {
    pub fn new(client: Client, base_url: &str, collection: &str, token: Option<String>) -> Self {
        Self {
            client,
            collection_url: format!("{}/{}", base_url.trim_end_matches('/'), collection),
            token,
        }
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url, urlencoding::encode(id))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorized(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteService for RestService {
    async fn add(&self, entity: &Value) -> Result<Option<EntityId>, RemoteError> {
        let response = self
            .send(self.client.post(&self.collection_url).json(entity))
            .await?;

        // Backends may answer with an empty body; only a JSON `id` counts
        let created = response.json::<Created>().await.ok();
        Ok(created.and_then(|c| c.id).and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }))
    }

    async fn update(&self, id: &str, entity: &Value) -> Result<(), RemoteError> {
        self.send(self.client.put(self.record_url(id)).json(entity))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.send(self.client.delete(self.record_url(id))).await?;
        Ok(())
    }
}
