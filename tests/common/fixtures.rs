//! Mock provider endpoints and on-disk fixtures.
#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use luna::test_utils::{TestDir, chat_reply, make_test_config_toml, mock_path};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches a chat-completions request whose last message is `prompt`.
pub struct LastPrompt(pub String);

impl Match for LastPrompt {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| {
                body.pointer("/messages")
                    .and_then(Value::as_array)
                    .and_then(|m| m.last())
                    .and_then(|m| m.pointer("/content"))
                    .and_then(Value::as_str)
                    .map(|content| content == self.0)
            })
            .unwrap_or(false)
    }
}

/// Answer probes for `id` with "pong".
pub async fn mount_online(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path(mock_path(id)))
        .and(LastPrompt(luna::core::availability::PROBE_PROMPT.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("pong")))
        .mount(server)
        .await;
}

/// Respond to `prompt` sent to `id` with `response`.
pub async fn mount_answer(server: &MockServer, id: &str, prompt: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(mock_path(id)))
        .and(LastPrompt(prompt.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Online provider that answers `prompt` with `text`.
pub async fn mount_replying(server: &MockServer, id: &str, prompt: &str, text: &str) {
    mount_online(server, id).await;
    mount_answer(server, id, prompt, ok(text)).await;
}

pub fn ok(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(chat_reply(text))
}

pub fn slow(text: &str, delay: Duration) -> ResponseTemplate {
    ok(text).set_delay(delay)
}

pub fn empty() -> ResponseTemplate {
    ok("   ")
}

pub fn quota() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(serde_json::json!({
        "error": { "type": "insufficient_quota", "message": "You exceeded your current quota" }
    }))
}

pub fn server_error() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_string("internal error")
}

/// Requests received for `id` whose last prompt is `prompt`.
pub async fn requests_for(server: &MockServer, id: &str, prompt: &str) -> Vec<Request> {
    let matcher = LastPrompt(prompt.to_string());
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == mock_path(id) && matcher.matches(r))
        .collect()
}

/// Model field of a captured request.
pub fn model_of(request: &Request) -> Option<String> {
    serde_json::from_slice::<Value>(&request.body)
        .ok()?
        .get("model")?
        .as_str()
        .map(String::from)
}

/// Temp dir holding a config that registers `providers` at `server`,
/// and an empty credentials file.
pub struct CliFixture {
    pub dir: TestDir,
    pub config: PathBuf,
    pub credentials: PathBuf,
}

impl CliFixture {
    pub fn new(server: &MockServer, providers: &[(&str, u8)]) -> Self {
        let dir = TestDir::new();
        let config = dir.create_file("config.toml", &make_test_config_toml(&server.uri(), providers));
        let credentials = dir.create_file("credentials.json", "{}");
        Self {
            dir,
            config,
            credentials,
        }
    }
}
