//! Model collaborator abstraction.
//!
//! Every model response is parsed into a `ModelReply` envelope up front so
//! downstream code matches on a tag instead of sniffing strings for error
//! markers. The shipped `CommandModel` pipes a prompt to an external command
//! over stdin and reads its stdout, which keeps the engine independent of any
//! particular model vendor.

use async_trait::async_trait;
use tracing::debug;

/// Parsed response from a model collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Free-text output.
    Text(String),
    /// Output that parsed as JSON.
    Structured(serde_json::Value),
    /// The collaborator failed; the reason is carried as data so callers
    /// can surface it without aborting.
    Failure(String),
}

impl ModelReply {
    /// Parse raw model output into an envelope. Valid JSON becomes
    /// `Structured`, everything else `Text`.
    pub fn from_output(raw: &str) -> Self {
        let trimmed = raw.trim();
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) if value.is_object() || value.is_array() => Self::Structured(value),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    /// Render the reply as text for findings and prompts. Failures render
    /// as a labeled error message so they stay visible downstream.
    pub fn to_display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Failure(reason) => format!("Error in check evaluation: {reason}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// A blocking model invocation. Implementations must not panic on
/// collaborator failure; they report it through `ModelReply::Failure`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> ModelReply;
}

/// Model client that shells out to an external command.
///
/// The prompt is written to the command's stdin and stdout is taken as the
/// reply. Spawn failures and non-zero exits become `ModelReply::Failure`.
pub struct CommandModel {
    command: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl ModelClient for CommandModel {
    async fn complete(&self, prompt: &str) -> ModelReply {
        use tokio::io::AsyncWriteExt;
        use tokio::process::Command;

        debug!(command = %self.command, prompt_chars = prompt.len(), "invoking model command");

        let mut child = match Command::new(&self.command)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ModelReply::Failure(format!(
                    "failed to spawn model command '{}': {e}",
                    self.command
                ));
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                return ModelReply::Failure(format!("failed to write prompt to model: {e}"));
            }
            if let Err(e) = stdin.shutdown().await {
                return ModelReply::Failure(format!("failed to close model stdin: {e}"));
            }
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => return ModelReply::Failure(format!("model command did not complete: {e}")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ModelReply::Failure(format!(
                "model command exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        ModelReply::from_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_output_becomes_structured() {
        let reply = ModelReply::from_output(r#"{"day_1": []}"#);
        assert!(matches!(reply, ModelReply::Structured(_)));
    }

    #[test]
    fn plain_text_output_becomes_text() {
        let reply = ModelReply::from_output("Looks good overall.\n");
        assert_eq!(reply, ModelReply::Text("Looks good overall.".to_string()));
    }

    #[test]
    fn scalar_json_stays_text() {
        // A bare "None" or a number is not a structured artifact.
        assert_eq!(
            ModelReply::from_output("42"),
            ModelReply::Text("42".to_string())
        );
    }

    #[test]
    fn failure_renders_with_label() {
        let reply = ModelReply::Failure("timeout".to_string());
        assert!(reply.is_failure());
        assert!(reply.to_display_text().contains("Error in check evaluation"));
        assert!(reply.to_display_text().contains("timeout"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_model_round_trips_through_cat() {
        let model = CommandModel::new("cat", vec![]);
        let reply = model.complete("echo me back").await;
        assert_eq!(reply, ModelReply::Text("echo me back".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_command_reports_failure() {
        let model = CommandModel::new("definitely-not-a-real-model-cmd", vec![]);
        let reply = model.complete("hello").await;
        assert!(reply.is_failure());
    }
}
