//! Generative engine boundary.
//!
//! The core treats the engine as an opaque async capability: a structured
//! prompt goes in, text comes out, and any failure (connection, timeout,
//! HTTP error, empty body) is an agent-level error, never a crash. The
//! single-method trait keeps deterministic substitutes easy in tests.

use crate::error::{CouncilError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// An injected async inference capability.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Run one inference with the given system and user prompts.
    async fn infer(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Configuration for the Ollama-backed engine client.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

/// Message in the chat request body.
#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Inference client backed by a local or remote Ollama server.
pub struct OllamaClient {
    config: EngineConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client; fails if the HTTP client cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CouncilError::Engine(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn infer(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.ollama_url);

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!(
            "Sending inference request to {} ({} chars)",
            url,
            user_prompt.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CouncilError::Engine(format!(
                        "request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    CouncilError::Engine(format!(
                        "cannot connect to Ollama at {}",
                        self.config.ollama_url
                    ))
                } else {
                    CouncilError::Engine(format!("failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CouncilError::Engine(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| CouncilError::MalformedResponse(format!("invalid chat body: {}", e)))?;

        if chat_response.message.content.trim().is_empty() {
            return Err(CouncilError::MalformedResponse(
                "engine returned an empty response".to_string(),
            ));
        }

        Ok(chat_response.message.content)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Deterministic engine substitutes shared by the module tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Engine that replays canned responses in order, then repeats the last.
    pub struct ScriptedEngine {
        responses: Mutex<VecDeque<String>>,
        last: Mutex<Option<String>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedEngine {
        pub fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedEngine {
        async fn infer(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut queue = self.responses.lock().await;
            match queue.pop_front() {
                Some(next) => {
                    *self.last.lock().await = Some(next.clone());
                    Ok(next)
                }
                None => {
                    let last = self.last.lock().await;
                    last.clone().ok_or_else(|| {
                        CouncilError::Engine("scripted engine exhausted".to_string())
                    })
                }
            }
        }
    }

    /// Engine that always fails, for failure-isolation tests.
    pub struct FailingEngine;

    #[async_trait]
    impl InferenceClient for FailingEngine {
        async fn infer(&self, _system: &str, _user: &str) -> Result<String> {
            Err(CouncilError::Engine("synthetic engine failure".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.model_name, "llama3.2:latest");
        assert_eq!(config.timeout_seconds, 300);
    }

    #[tokio::test]
    async fn test_scripted_engine_replays_in_order() {
        use test_support::ScriptedEngine;

        let engine = ScriptedEngine::new(["first", "second"]);
        assert_eq!(engine.infer("s", "u").await.unwrap(), "first");
        assert_eq!(engine.infer("s", "u").await.unwrap(), "second");
        // Exhausted queue repeats the last response.
        assert_eq!(engine.infer("s", "u").await.unwrap(), "second");
        assert_eq!(engine.call_count(), 3);
    }
}
