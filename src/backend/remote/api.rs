//! Remote terminal API: trait seam plus the HTTP implementation.

use super::auth::{TOKEN_HEADER, generate_token, now_ms};
use crate::backend::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use termdeck_config::RemoteConfig;

fn default_alive() -> bool {
    true
}

/// A terminal provisioned on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTerminal {
    pub id: String,
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// Pane this terminal was provisioned for, when the host tracks it
    #[serde(default)]
    pub pane_id: Option<String>,
    #[serde(default)]
    pub group_key: Option<String>,
}

/// Output appended since a given offset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputChunk {
    #[serde(default)]
    pub data: String,
    /// Offset to request next
    pub offset: u64,
    pub alive: bool,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

#[async_trait]
pub trait RemoteTerminalApi: Send + Sync {
    async fn list_terminals(&self) -> Result<Vec<RemoteTerminal>, BackendError>;

    async fn fetch_output(&self, terminal_id: &str, offset: u64)
    -> Result<OutputChunk, BackendError>;

    async fn kill_terminal(&self, terminal_id: &str) -> Result<(), BackendError>;
}

/// `RemoteTerminalApi` over HTTP(S) with ureq
pub struct HttpRemoteApi {
    agent: ureq::Agent,
    base_url: String,
    secret: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(config: &RemoteConfig) -> Self {
        let secret = std::env::var(&config.auth_secret_env).ok();
        if secret.is_none() {
            log::warn!(
                "{} is not set; remote terminal requests will be unauthenticated",
                config.auth_secret_env
            );
        }
        Self {
            agent: crate::http::agent(Duration::from_secs(config.request_timeout_secs)),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<Option<String>, BackendError> {
        self.secret
            .as_deref()
            .map(|secret| generate_token(secret, now_ms()))
            .transpose()
    }

    async fn get_json<T>(&self, url: String) -> Result<T, BackendError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let token = self.token()?;
        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&url);
            if let Some(token) = token.as_deref() {
                request = request.header(TOKEN_HEADER, token);
            }
            let body = request
                .call()
                .map_err(|e| BackendError::Http(format!("GET {}: {}", url, e)))?
                .into_body()
                .read_to_string()
                .map_err(|e| BackendError::Http(format!("reading {}: {}", url, e)))?;
            serde_json::from_str(&body)
                .map_err(|e| BackendError::Http(format!("invalid response from {}: {}", url, e)))
        })
        .await
        .map_err(|e| BackendError::Http(e.to_string()))?
    }
}

#[async_trait]
impl RemoteTerminalApi for HttpRemoteApi {
    async fn list_terminals(&self) -> Result<Vec<RemoteTerminal>, BackendError> {
        self.get_json(self.url("/terminals")).await
    }

    async fn fetch_output(
        &self,
        terminal_id: &str,
        offset: u64,
    ) -> Result<OutputChunk, BackendError> {
        self.get_json(self.url(&format!(
            "/terminals/{}/output?offset={}",
            terminal_id, offset
        )))
        .await
    }

    async fn kill_terminal(&self, terminal_id: &str) -> Result<(), BackendError> {
        let agent = self.agent.clone();
        let token = self.token()?;
        let url = self.url(&format!("/terminals/{}", terminal_id));
        tokio::task::spawn_blocking(move || {
            let mut request = agent.delete(&url);
            if let Some(token) = token.as_deref() {
                request = request.header(TOKEN_HEADER, token);
            }
            request
                .call()
                .map(|_| ())
                .map_err(|e| BackendError::Http(format!("DELETE {}: {}", url, e)))
        })
        .await
        .map_err(|e| BackendError::Http(e.to_string()))?
    }
}
