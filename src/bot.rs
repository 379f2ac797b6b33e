use std::sync::Arc;

use tracing::{debug, info};

use crate::append;
use crate::backend::{BackendKind, DocumentBackend};
use crate::error::CommandError;
use crate::platform::InboundCommand;

/// Shared application state
pub struct AppState {
    pub bot_token: String,
    pub backend: Arc<dyn DocumentBackend>,
}

impl AppState {
    pub fn new(bot_token: String, backend: Arc<dyn DocumentBackend>) -> Self {
        Self { bot_token, backend }
    }
}

/// Handle one command and return the reply to send, or `None` when the
/// command is not ours.
pub async fn handle_command(state: &AppState, command: &InboundCommand) -> Option<String> {
    let kind = state.backend.kind();

    if command.name == "start" || command.name == "help" {
        return Some(welcome(kind).to_string());
    }

    if command.name != kind.append_command() {
        debug!("Ignoring /{} in chat {}", command.name, command.chat_id);
        return None;
    }

    info!(
        "/{} in chat {} ({} args, reply: {})",
        command.name,
        command.chat_id,
        command.args.len(),
        command.reply_text.is_some()
    );

    let outcome = append::append(state.backend.as_ref(), command).await;
    Some(render_outcome(kind, &outcome))
}

fn welcome(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Github => {
            "Hi! I can help you add agent links to the README. Use /addagent followed by the link."
        }
        BackendKind::GoogleDocs => {
            "Hi! I can add text to the shared document. Use /add followed by the text, \
             or reply to a message with /add."
        }
    }
}

/// Longest backend diagnostic quoted back to the chat, in characters.
const MAX_DIAGNOSTIC_CHARS: usize = 1000;

/// Cut a raw backend diagnostic down to `max_chars`, marking the cut.
fn truncate_diagnostic(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}… (truncated)", &raw[..idx]),
        None => raw.to_string(),
    }
}

/// Chat reply for the result of an append command.
pub fn render_outcome(kind: BackendKind, outcome: &Result<(), CommandError>) -> String {
    match (kind, outcome) {
        (BackendKind::Github, Ok(())) => "Successfully added the link to README!".to_string(),
        (BackendKind::GoogleDocs, Ok(())) => {
            "Successfully added the text to the document!".to_string()
        }
        (BackendKind::Github, Err(CommandError::MissingInput)) => {
            "Please provide a link after the /addagent command.".to_string()
        }
        (BackendKind::GoogleDocs, Err(CommandError::MissingInput)) => {
            "Please provide text after the /add command, or use /add as a reply to a message."
                .to_string()
        }
        (BackendKind::Github, Err(CommandError::Append(e))) => {
            format!(
                "Error updating README: {}",
                truncate_diagnostic(&e.to_string(), MAX_DIAGNOSTIC_CHARS)
            )
        }
        (BackendKind::GoogleDocs, Err(CommandError::Append(e))) => {
            format!(
                "Error updating document: {}",
                truncate_diagnostic(&e.to_string(), MAX_DIAGNOSTIC_CHARS)
            )
        }
    }
}
