pub mod telegram;

/// A bot command received from a chat, independent of the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCommand {
    /// Lowercase command name without the leading slash or `@botname` suffix.
    pub name: String,
    /// Whitespace-separated arguments following the command.
    pub args: Vec<String>,
    /// Text of the message this command replied to, if any.
    pub reply_text: Option<String>,
    pub chat_id: i64,
}

impl InboundCommand {
    /// Parse `/name[@bot] args...`. Returns `None` for anything that is not a
    /// command, and for commands addressed to a bot other than `bot_username`.
    pub fn parse(
        text: &str,
        bot_username: &str,
        reply_text: Option<String>,
        chat_id: i64,
    ) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?.strip_prefix('/')?;
        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (head, None),
        };
        if name.is_empty() {
            return None;
        }
        if let Some(mention) = mention {
            if !mention.eq_ignore_ascii_case(bot_username) {
                return None;
            }
        }

        Some(Self {
            name: name.to_lowercase(),
            args: tokens.map(str::to_string).collect(),
            reply_text,
            chat_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_args() {
        let cmd =
            InboundCommand::parse("/addagent https://example.com/agent", "ButlerBot", None, 7)
                .unwrap();
        assert_eq!(cmd.name, "addagent");
        assert_eq!(cmd.args, vec!["https://example.com/agent"]);
        assert_eq!(cmd.reply_text, None);
        assert_eq!(cmd.chat_id, 7);
    }

    #[test]
    fn test_parse_strips_bot_mention_and_collapses_whitespace() {
        let cmd =
            InboundCommand::parse("/Add@butlerbot   one \n two", "ButlerBot", None, 1).unwrap();
        assert_eq!(cmd.name, "add");
        assert_eq!(cmd.args, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_keeps_reply_text() {
        let cmd =
            InboundCommand::parse("/add", "ButlerBot", Some("Agent X notes".to_string()), 1)
                .unwrap();
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.reply_text.as_deref(), Some("Agent X notes"));
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        assert!(InboundCommand::parse("hello there", "ButlerBot", None, 1).is_none());
        assert!(InboundCommand::parse("", "ButlerBot", None, 1).is_none());
        assert!(InboundCommand::parse("/", "ButlerBot", None, 1).is_none());
        assert!(InboundCommand::parse("/@ButlerBot", "ButlerBot", None, 1).is_none());
    }

    #[test]
    fn test_parse_ignores_command_for_another_bot() {
        assert!(
            InboundCommand::parse("/addagent@SomeOtherBot https://x", "ButlerBot", None, 1)
                .is_none()
        );
        assert!(InboundCommand::parse("/add@", "ButlerBot", None, 1).is_none());
    }
}
