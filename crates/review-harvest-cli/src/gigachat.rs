//! GigaChat chat-completions client.
//!
//! Authentication is a two-step exchange: the long-lived authorization key
//! is traded at the OAuth endpoint for a short-lived access token, which is
//! cached and sent as a bearer token on chat requests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use review_harvest::{ChatClient, HarvestError, HarvestResult};

pub const DEFAULT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_API_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1";

/// Tokens this close to expiry are refreshed early.
const EXPIRY_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GigaChatSettings {
    pub auth_url: String,
    pub api_url: String,
    pub scope: String,
    pub model: String,
    pub timeout_ms: u64,
    /// Skip TLS certificate verification. The public endpoints use a
    /// national CA that most trust stores lack.
    pub accept_invalid_certs: bool,
}

impl Default for GigaChatSettings {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            scope: "GIGACHAT_API_PERS".to_string(),
            model: "GigaChat".to_string(),
            timeout_ms: 60_000,
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix time in milliseconds.
    expires_at: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms + EXPIRY_MARGIN_MS < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub struct GigaChatClient {
    http: reqwest::Client,
    settings: GigaChatSettings,
    credential: String,
    token: Mutex<Option<AccessToken>>,
}

impl GigaChatClient {
    pub fn new(credential: String, settings: GigaChatSettings) -> Result<Self> {
        anyhow::ensure!(!credential.trim().is_empty(), "missing GigaChat credential");
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .context("failed to build GigaChat HTTP client")?;
        Ok(Self {
            http,
            settings,
            credential: credential.trim().to_string(),
            token: Mutex::new(None),
        })
    }

    /// Cached access token, exchanging the credential when needed.
    async fn access_token(&self) -> HarvestResult<String> {
        let mut cached = self.token.lock().await;
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        tracing::debug!("Requesting GigaChat access token");
        let response = self
            .http
            .post(&self.settings.auth_url)
            .header(AUTHORIZATION, format!("Basic {}", self.credential))
            .header(ACCEPT, "application/json")
            .header("RqUID", uuid::Uuid::new_v4().to_string())
            .form(&[("scope", self.settings.scope.as_str())])
            .send()
            .await
            .map_err(|e| HarvestError::Chat(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::Chat(format!(
                "token request failed ({status}): {body}"
            )));
        }
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Chat(format!("invalid token response: {e}")))?;

        let token = AccessToken {
            value: parsed.access_token,
            expires_at: parsed.expires_at,
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl ChatClient for GigaChatClient {
    async fn complete(&self, prompt: &str) -> HarvestResult<String> {
        let token = self.access_token().await?;
        let endpoint = format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&token)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| HarvestError::Chat(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::Chat(format!("failed to read reply: {e}")))?;

        if status == StatusCode::UNAUTHORIZED {
            self.forget_token().await;
        }
        if !status.is_success() {
            return Err(HarvestError::Chat(format!(
                "chat request failed ({status}): {body}"
            )));
        }

        extract_content(&body).ok_or(HarvestError::MalformedReply(body))
    }
}

/// `choices[0].message.content` of a chat-completions reply.
fn extract_content(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/choices/0/message/content")?
        .as_str()
        .map(String::from)
}
