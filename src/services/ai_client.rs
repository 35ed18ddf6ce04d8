//! Client for the external AI scoring service.
//!
//! The service exposes a primary host (tunnelled) and a local fallback; each
//! scoring call tries the primary first and the fallback second, bounded by a
//! fixed per-call timeout. There is no further retry here - retries are
//! client-triggered through the analysis retry endpoint.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum AiClientError {
    #[error("AI scoring service unreachable: {0}")]
    Unreachable(String),
    #[error("AI scoring service reported failure: {0}")]
    ScoringFailed(String),
}

#[derive(Debug, Deserialize)]
struct ScoreEnvelope {
    success: bool,
    data: Option<Value>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub data: Value,
    pub server_used: String,
}

pub struct AiClient {
    client: reqwest::Client,
    primary_url: Option<String>,
    fallback_url: String,
}

impl AiClient {
    pub fn from_config() -> Self {
        let ai = &config::config().ai;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ai.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            primary_url: ai.primary_url.clone(),
            fallback_url: ai.fallback_url.clone(),
        }
    }

    fn hosts(&self) -> Vec<&str> {
        match &self.primary_url {
            Some(primary) => vec![primary.as_str(), self.fallback_url.as_str()],
            None => vec![self.fallback_url.as_str()],
        }
    }

    pub async fn health_check(&self) -> bool {
        let url = self
            .primary_url
            .as_deref()
            .unwrap_or(self.fallback_url.as_str());
        match self
            .client
            .get(format!("{}/health", url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("AI server health check failed: {}", e);
                false
            }
        }
    }

    /// Submit an input snapshot for scoring. Two attempts at most: primary
    /// host then fallback; the last error propagates if both fail.
    pub async fn score(&self, payload: &Value) -> Result<ScoreResult, AiClientError> {
        let hosts = self.hosts();
        let mut last_error = AiClientError::Unreachable("no hosts configured".to_string());

        for (index, host) in hosts.iter().enumerate() {
            match self.score_once(host, payload).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(host = *host, "AI scoring attempt failed: {}", e);
                    if index + 1 < hosts.len() {
                        tracing::info!("trying fallback AI server");
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn score_once(&self, host: &str, payload: &Value) -> Result<ScoreResult, AiClientError> {
        let response = self
            .client
            .post(format!("{}/api/verify", host))
            .json(payload)
            .send()
            .await
            .map_err(|e| AiClientError::Unreachable(e.to_string()))?;

        let envelope: ScoreEnvelope = response
            .json()
            .await
            .map_err(|e| AiClientError::Unreachable(format!("invalid response: {}", e)))?;

        if !envelope.success {
            return Err(AiClientError::ScoringFailed(
                envelope.error.unwrap_or_else(|| "verification failed".to_string()),
            ));
        }

        Ok(ScoreResult {
            data: envelope.data.unwrap_or(Value::Null),
            server_used: host.to_string(),
        })
    }
}
