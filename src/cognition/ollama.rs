//! Ollama cognition backend.
//!
//! Talks to a local Ollama server (typically `http://localhost:11434`) over
//! its non-streaming `/api/chat` endpoint with a blocking HTTP client.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{render_prompt, Cognition, CognitionError, Result};
use crate::config::CognitionConfig;

#[derive(Debug, Clone)]
pub struct OllamaCognition {
    base_url: String,
    model: String,
    system_prompt: String,
    client: Client,
}

impl OllamaCognition {
    pub fn new(config: &CognitionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CognitionError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            client,
        })
    }

    /// Verify the server answers `/api/tags`. Any failure is reported as
    /// [`CognitionError::Unavailable`] since it happens before any work starts.
    pub fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().map_err(|e| {
            CognitionError::Unavailable(format!(
                "cannot reach Ollama at {}: {e}. Start it with `ollama serve`",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            return Err(CognitionError::Unavailable(format!(
                "Ollama health check failed with HTTP {}",
                response.status()
            )));
        }

        tracing::info!(url = %self.base_url, model = %self.model, "cognition backend reachable");
        Ok(())
    }

    fn build_request(&self, prompt: &str, context: &[String]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: render_prompt(prompt, context),
                },
            ],
            stream: false,
        }
    }
}

impl Cognition for OllamaCognition {
    fn ask(&self, prompt: &str, context: &[String]) -> Result<String> {
        let request = self.build_request(prompt, context);
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            context_items = context.len(),
            "ollama request"
        );

        let start = std::time::Instant::now();
        let response = self.client.post(&url).json(&request).send().map_err(|e| {
            if e.is_timeout() {
                CognitionError::Timeout
            } else {
                CognitionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(CognitionError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| CognitionError::Parse(e.to_string()))?;

        tracing::debug!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            answer_chars = body.message.content.len(),
            "ollama response"
        );

        Ok(body.message.content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_system_and_user_messages() {
        let backend = OllamaCognition::new(&CognitionConfig::default()).unwrap();
        let request = backend.build_request("What changed?", &["note one".into()]);

        assert_eq!(request.model, "llama3.1:8b");
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1].content.contains("note one"));
        assert!(request.messages[1].content.contains("What changed?"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let mut config = CognitionConfig::default();
        config.base_url = "http://localhost:11434/".into();
        let backend = OllamaCognition::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_unreachable_server_fails_health_check() {
        let mut config = CognitionConfig::default();
        // Port 9 (discard) on localhost is essentially never an HTTP server.
        config.base_url = "http://127.0.0.1:9".into();
        config.request_timeout_secs = 2;
        let backend = OllamaCognition::new(&config).unwrap();
        let err = backend.health_check().unwrap_err();
        assert!(matches!(err, CognitionError::Unavailable(_)));
    }
}
