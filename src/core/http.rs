//! HTTP client for provider calls.
//!
//! One [`ProviderClient`] is shared by the prober and the dispatcher. Every
//! call goes through [`ProviderClient::complete`], which builds the request,
//! bounds it with a timeout and classifies whatever comes back.

use std::time::{Duration, Instant};

use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;

use super::credentials::Secret;
use super::fallback::is_rate_limited;
use super::history::ConversationHistory;
use super::provider::{AuthScheme, ProviderDescriptor};
use super::wire;
use crate::error::{LunaError, Result};

/// Connect timeout; the request timeout is applied per call.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest provider error body kept in error messages.
const MAX_ERROR_BODY: usize = 300;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client() -> Result<Client> {
    ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(format!("luna/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LunaError::config(format!("could not build HTTP client: {e}")))
}

/// A request to one provider with one model.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub descriptor: &'a ProviderDescriptor,
    pub model: &'a str,
    pub credential: Option<&'a Secret>,
    pub history: &'a ConversationHistory,
    pub prompt: &'a str,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
        })
    }

    /// Send `call` and return the extracted, non-blank reply.
    ///
    /// # Errors
    ///
    /// - [`LunaError::Timeout`] when the call does not finish in time
    /// - [`LunaError::RateLimited`] on HTTP 429 or a quota token in the error body
    /// - [`LunaError::Transport`] on other non-2xx statuses, connection errors
    ///   or a body that is not JSON
    /// - [`LunaError::EmptyResponse`] when the reply is missing or blank
    pub async fn complete(&self, call: Call<'_>) -> Result<String> {
        let provider = call.descriptor.id.as_str();
        let start = Instant::now();

        let result = match tokio::time::timeout(call.timeout, self.send(&call)).await {
            Ok(result) => result,
            Err(_) => Err(LunaError::Timeout {
                provider: provider.to_string(),
                seconds: call.timeout.as_secs(),
            }),
        };

        tracing::trace!(
            provider,
            model = call.model,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "Provider call finished"
        );
        result
    }

    async fn send(&self, call: &Call<'_>) -> Result<String> {
        let descriptor = call.descriptor;
        let provider = descriptor.id.as_str();
        let body = wire::build_request(descriptor, call.model, call.history, call.prompt);

        let request = self
            .client
            .post(descriptor.endpoint_for(call.model))
            .json(&body);
        let request = authorize(request, &descriptor.auth, call.credential);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LunaError::Timeout {
                    provider: provider.to_string(),
                    seconds: call.timeout.as_secs(),
                }
            } else {
                LunaError::Transport {
                    provider: provider.to_string(),
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LunaError::Transport {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: format!("could not read body: {e}"),
        })?;

        if !status.is_success() {
            let message = truncate(&text, MAX_ERROR_BODY);
            if is_rate_limited(status.as_u16(), &text) {
                return Err(LunaError::RateLimited {
                    provider: provider.to_string(),
                    model: call.model.to_string(),
                    message,
                });
            }
            return Err(LunaError::Transport {
                provider: provider.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}: {message}"),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| LunaError::Transport {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: format!("malformed JSON: {e}"),
        })?;

        match wire::extract_reply(descriptor, &json) {
            Some(reply) if !reply.trim().is_empty() => Ok(reply),
            _ => Err(LunaError::EmptyResponse {
                provider: provider.to_string(),
            }),
        }
    }
}

fn authorize(request: RequestBuilder, auth: &AuthScheme, credential: Option<&Secret>) -> RequestBuilder {
    match (auth, credential) {
        (AuthScheme::Bearer, Some(secret)) => request.bearer_auth(secret.expose()),
        (AuthScheme::Header(name), Some(secret)) => request.header(name.as_str(), secret.expose()),
        _ => request,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
