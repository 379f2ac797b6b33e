use tracing::warn;

use crate::backend::DocumentBackend;
use crate::error::CommandError;
use crate::platform::InboundCommand;

/// Marker placed before every entry appended to a file document.
pub const FILE_ENTRY_MARKER: &str = "\n- ";

/// Line drawn above every entry appended to a rich document.
pub const SEPARATOR: &str = "────────────────────────";

/// Text to append, derived from an inbound command. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRequest {
    text: String,
}

impl AppendRequest {
    /// Text of the replied-to message wins, taken verbatim. Otherwise the
    /// argument tokens joined with single spaces.
    pub fn from_command(command: &InboundCommand) -> Result<Self, CommandError> {
        let text = match command.reply_text.as_deref() {
            Some(reply) if !reply.trim().is_empty() => reply.to_string(),
            _ => command.args.join(" "),
        };

        if text.trim().is_empty() {
            return Err(CommandError::MissingInput);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// New file content with `text` added as a list entry.
pub fn file_entry(current: &str, text: &str) -> String {
    format!("{current}{FILE_ENTRY_MARKER}{text}")
}

/// Text inserted at the end of a rich document.
pub fn doc_payload(text: &str) -> String {
    format!("{SEPARATOR}\n\n{text}")
}

/// Run the append operation for `command` against `backend`.
pub async fn append(
    backend: &dyn DocumentBackend,
    command: &InboundCommand,
) -> Result<(), CommandError> {
    let request = AppendRequest::from_command(command)?;

    backend.append(request.text()).await.map_err(|e| {
        if e.is_conflict() {
            warn!("{} changed while appending: {}", backend.target(), e);
        } else {
            warn!("Append to {} failed: {}", backend.target(), e);
        }
        CommandError::Append(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::error::AppendError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory file document recording every write.
    struct MemoryBackend {
        content: Mutex<String>,
        calls: Mutex<u32>,
        fail_with: Option<u16>,
    }

    impl MemoryBackend {
        fn new(content: &str) -> Self {
            Self {
                content: Mutex::new(content.to_string()),
                calls: Mutex::new(0),
                fail_with: None,
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Self::new("")
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DocumentBackend for MemoryBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Github
        }

        fn target(&self) -> String {
            "memory".to_string()
        }

        async fn append(&self, text: &str) -> Result<(), AppendError> {
            *self.calls.lock().unwrap() += 1;
            if let Some(status) = self.fail_with {
                return Err(AppendError::Api {
                    status,
                    message: "rate limited".to_string(),
                });
            }
            let mut content = self.content.lock().unwrap();
            *content = file_entry(&content, text);
            Ok(())
        }
    }

    fn command(args: &[&str], reply_text: Option<&str>) -> InboundCommand {
        InboundCommand {
            name: "addagent".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reply_text: reply_text.map(str::to_string),
            chat_id: 42,
        }
    }

    #[test]
    fn test_file_entry_marker() {
        assert_eq!(
            file_entry("# Repo\n", "https://example.com/agent"),
            "# Repo\n\n- https://example.com/agent"
        );
        assert_eq!(file_entry("", "x"), "\n- x");
    }

    #[test]
    fn test_doc_payload_starts_with_separator() {
        let payload = doc_payload("Agent X notes");
        assert_eq!(payload, format!("{SEPARATOR}\n\nAgent X notes"));
        assert!(SEPARATOR.chars().all(|c| c == '─'));
    }

    #[test]
    fn test_request_joins_args_with_single_space() {
        let request = AppendRequest::from_command(&command(&["a", "b", "c"], None)).unwrap();
        assert_eq!(request.text(), "a b c");
    }

    #[test]
    fn test_request_prefers_reply_text_verbatim() {
        let request =
            AppendRequest::from_command(&command(&["ignored"], Some("  Agent X\nnotes "))).unwrap();
        assert_eq!(request.text(), "  Agent X\nnotes ");
    }

    #[test]
    fn test_request_falls_back_to_args_for_blank_reply() {
        let request = AppendRequest::from_command(&command(&["link"], Some("   "))).unwrap();
        assert_eq!(request.text(), "link");
    }

    #[test]
    fn test_request_missing_input() {
        let err = AppendRequest::from_command(&command(&[], None)).unwrap_err();
        assert!(matches!(err, CommandError::MissingInput));
    }

    #[tokio::test]
    async fn test_missing_input_never_calls_backend() {
        let backend = MemoryBackend::new("# Repo\n");
        let err = append(&backend, &command(&[], None)).await.unwrap_err();

        assert!(matches!(err, CommandError::MissingInput));
        assert_eq!(backend.calls(), 0);
        assert_eq!(*backend.content.lock().unwrap(), "# Repo\n");
    }

    #[tokio::test]
    async fn test_same_text_appended_twice() {
        let backend = MemoryBackend::new("# Repo\n");
        append(&backend, &command(&["link"], None)).await.unwrap();
        append(&backend, &command(&["link"], None)).await.unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(*backend.content.lock().unwrap(), "# Repo\n\n- link\n- link");
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped_once_and_not_retried() {
        let backend = MemoryBackend::failing(429);
        let err = append(&backend, &command(&["link"], None)).await.unwrap_err();

        assert_eq!(backend.calls(), 1);
        match err {
            CommandError::Append(inner) => assert_eq!(inner.to_string(), "429 rate limited"),
            other => panic!("expected append error, got {other:?}"),
        }
    }
}
