use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub model: String,
}

/// Reply from `POST /chat`. Fields are not validated; missing ones stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub response: Option<String>,
}

/// Reply from `POST /reset`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResetReply {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to chat endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat endpoint returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The one seam between the widget and the network.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError>;
    async fn reset(&self) -> Result<ResetReply, ClientError>;
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: Option<&ChatRequest>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting to chat endpoint");

        let mut request = self.client.post(&url);
        request = match body {
            Some(body) => request.json(body),
            None => request.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };
        let response = request.send().await?;

        // Error statuses are not special-cased: their body goes through the same parse
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "chat endpoint returned an error status");
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        self.post_json("/chat", Some(request)).await
    }

    async fn reset(&self) -> Result<ResetReply, ClientError> {
        self.post_json("/reset", None).await
    }
}
