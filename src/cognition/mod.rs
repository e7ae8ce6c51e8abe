//! Cognition collaborator: the language-model seam.
//!
//! The core only ever asks one blocking question at a time through
//! [`Cognition::ask`]. Concrete backends live in submodules; [`create_cognition`]
//! builds the configured backend wrapped in bounded retry.

pub mod ollama;
pub mod retry;

use crate::config::CognitionConfig;

/// Result type for cognition calls.
pub type Result<T> = std::result::Result<T, CognitionError>;

/// Errors a cognition backend can report.
#[derive(Debug, thiserror::Error)]
pub enum CognitionError {
    /// Backend missing or misconfigured. Fatal at construction.
    #[error("cognition backend unavailable: {0}")]
    Unavailable(String),

    #[error("cognition transport error: {0}")]
    Transport(String),

    #[error("cognition request timed out")]
    Timeout,

    #[error("cognition backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("malformed cognition response: {0}")]
    Parse(String),
}

impl CognitionError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable(_) | Self::Parse(_) => false,
        }
    }
}

/// A synchronous question/answer backend.
///
/// `context` is an ordered list of supporting passages (typically retrieved
/// from the Memory collaborator). Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait Cognition: Send + Sync {
    fn ask(&self, prompt: &str, context: &[String]) -> Result<String>;
}

/// Render the user-facing prompt: context block first, then the question.
pub fn render_prompt(prompt: &str, context: &[String]) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    format!(
        "Context:\n{}\n\nQuestion:\n{}\n\nRefer only to the context where it is relevant.",
        context.join("\n---\n"),
        prompt
    )
}

/// Create the configured cognition backend wrapped in retry.
///
/// Fails fast with [`CognitionError::Unavailable`] when the backend is unknown
/// or, if `check_on_startup` is set, unreachable.
pub fn create_cognition(config: &CognitionConfig) -> Result<Box<dyn Cognition>> {
    match config.provider.as_str() {
        "ollama" => {
            let backend = ollama::OllamaCognition::new(config)?;
            if config.check_on_startup {
                backend.health_check()?;
            }
            let policy = retry::RetryPolicy::from_config(&config.retry);
            Ok(Box::new(retry::RetryingCognition::new(backend, policy)))
        }
        other => Err(CognitionError::Unavailable(format!(
            "unknown cognition provider: {other}. Supported: ollama"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CognitionError::Timeout.is_transient());
        assert!(CognitionError::Transport("reset".into()).is_transient());
        assert!(CognitionError::Backend { status: 503, message: String::new() }.is_transient());
        assert!(CognitionError::Backend { status: 429, message: String::new() }.is_transient());
        assert!(!CognitionError::Backend { status: 404, message: String::new() }.is_transient());
        assert!(!CognitionError::Unavailable("gone".into()).is_transient());
        assert!(!CognitionError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn test_prompt_without_context_is_verbatim() {
        assert_eq!(render_prompt("Why?", &[]), "Why?");
    }

    #[test]
    fn test_prompt_with_context_lists_passages() {
        let rendered = render_prompt("Why?", &["a".into(), "b".into()]);
        assert!(rendered.starts_with("Context:\na\n---\nb"));
        assert!(rendered.contains("Question:\nWhy?"));
    }

    #[test]
    fn test_unknown_provider_is_unavailable() {
        let mut config = CognitionConfig::default();
        config.provider = "telepathy".into();
        let err = create_cognition(&config).err().unwrap();
        assert!(matches!(err, CognitionError::Unavailable(_)));
    }
}
