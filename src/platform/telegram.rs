use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::bot::{handle_command, AppState};
use crate::platform::InboundCommand;

/// Telegram caps a single message at 4096 characters.
const MAX_MESSAGE_LEN: usize = 4000;

/// Username of this bot, used to skip commands addressed to other bots.
#[derive(Clone)]
struct BotUsername(String);

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Run the Telegram bot platform
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.bot_token);

    let me = bot
        .get_me()
        .await
        .context("Failed to fetch bot identity from Telegram")?;
    let username = BotUsername(me.username().to_string());

    info!("Starting Telegram platform as @{}...", username.0);

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, username])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Text of a message, falling back to a media caption.
fn message_text(msg: &Message) -> Option<&str> {
    msg.text().or_else(|| msg.caption())
}

/// Build the command carried by `msg`, if it is one addressed to this bot.
fn command_from_message(msg: &Message, bot_username: &str) -> Option<InboundCommand> {
    let text = message_text(msg)?;
    let reply_text = msg
        .reply_to_message()
        .and_then(message_text)
        .map(str::to_string);

    InboundCommand::parse(text, bot_username, reply_text, msg.chat.id.0)
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    username: BotUsername,
) -> ResponseResult<()> {
    let command = match command_from_message(&msg, &username.0) {
        Some(c) => c,
        None => return Ok(()),
    };

    if let Some(reply) = handle_command(&state, &command).await {
        for chunk in split_message(&reply, MAX_MESSAGE_LEN) {
            bot.send_message(msg.chat.id, chunk).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat() -> serde_json::Value {
        json!({ "id": 42, "type": "private", "first_name": "Ann" })
    }

    fn from() -> serde_json::Value {
        json!({ "id": 7, "is_bot": false, "first_name": "Ann" })
    }

    fn text_message(id: i32, text: &str) -> serde_json::Value {
        json!({
            "message_id": id,
            "date": 1_700_000_000,
            "chat": chat(),
            "from": from(),
            "text": text,
        })
    }

    fn photo_message(id: i32, caption: &str) -> serde_json::Value {
        json!({
            "message_id": id,
            "date": 1_700_000_000,
            "chat": chat(),
            "from": from(),
            "photo": [{
                "file_id": "photo-file",
                "file_unique_id": "photo-unique",
                "file_size": 10,
                "width": 1,
                "height": 1
            }],
            "caption": caption,
        })
    }

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_command_with_reply() {
        let mut value = text_message(2, "/add");
        value["reply_to_message"] = text_message(1, "Agent X notes");

        let cmd = command_from_message(&message(value), "ButlerBot").unwrap();
        assert_eq!(cmd.name, "add");
        assert_eq!(cmd.reply_text.as_deref(), Some("Agent X notes"));
        assert_eq!(cmd.chat_id, 42);
    }

    #[test]
    fn test_caption_command_and_caption_reply() {
        let mut value = photo_message(2, "/addagent@ButlerBot");
        value["reply_to_message"] = photo_message(1, "https://example.com/agent");

        let cmd = command_from_message(&message(value), "ButlerBot").unwrap();
        assert_eq!(cmd.name, "addagent");
        assert_eq!(cmd.reply_text.as_deref(), Some("https://example.com/agent"));
    }

    #[test]
    fn test_message_for_another_bot_is_skipped() {
        let value = text_message(3, "/addagent@SomeOtherBot https://x");
        assert!(command_from_message(&message(value), "ButlerBot").is_none());
    }

    #[test]
    fn test_split_message_short_text_is_one_chunk() {
        assert_eq!(split_message("ok", MAX_MESSAGE_LEN), vec!["ok".to_string()]);
    }

    #[test]
    fn test_split_message_keeps_every_chunk_under_limit() {
        let text = format!("Error updating README: {}", "é ".repeat(3000));
        let chunks = split_message(&text, MAX_MESSAGE_LEN);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
        assert_eq!(chunks.concat(), text);
    }
}
