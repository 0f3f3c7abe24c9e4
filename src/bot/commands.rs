//! Slash-command parsing for inbound chat text.
//!
//! Commands are recognised only when the text starts with `/`. The command word is
//! case-insensitive and may carry a `@BotName` suffix (group chats); a suffix naming a
//! different bot yields [`BotCommand::Ignored`]. Arguments are split on whitespace and
//! interpreted by the dispatcher.
use log::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Register,
    Status,
    /// `/history` or `/history <username>`.
    History(Option<String>),
    /// `/addpoints <points>`; raw arguments, validated by the ledger.
    AddPoints(Vec<String>),
    /// `/addreward <reward_name...> <cost>`.
    AddReward(Vec<String>),
    Redeem,
    /// `/start`, `/help`.
    Help,
    /// Plain text or an unknown command: answered with the greeting.
    Other,
    /// Command addressed to another bot.
    Ignored,
}

/// Command parser, optionally aware of the bot's own handle.
#[derive(Debug, Default, Clone)]
pub struct CommandParser {
    bot_username: Option<String>,
}

impl CommandParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot_username(username: &str) -> Self {
        Self {
            bot_username: Some(username.trim_start_matches('@').to_string()),
        }
    }

    pub fn set_bot_username(&mut self, username: &str) {
        self.bot_username = Some(username.trim_start_matches('@').to_string());
    }

    pub fn parse(&self, raw: &str) -> BotCommand {
        let trimmed = raw.trim();
        let Some(body) = trimmed.strip_prefix('/') else {
            return BotCommand::Other;
        };
        let mut words = body.split_whitespace();
        let Some(head) = words.next() else {
            return BotCommand::Other;
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let word = match head.split_once('@') {
            Some((word, target)) => {
                if let Some(me) = &self.bot_username {
                    if !target.eq_ignore_ascii_case(me) {
                        trace!("Ignoring /{} addressed to @{}", word, target);
                        return BotCommand::Ignored;
                    }
                }
                word
            }
            None => head,
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "register" => BotCommand::Register,
            "status" => BotCommand::Status,
            "history" => BotCommand::History(args.into_iter().next()),
            "addpoints" | "add_points" => BotCommand::AddPoints(args),
            "addreward" | "add_reward" => BotCommand::AddReward(args),
            "redeem" => BotCommand::Redeem,
            "start" | "help" => BotCommand::Help,
            _ => BotCommand::Other,
        };
        trace!("Parsed {:?} from '{}'", command, crate::logutil::escape_log(raw));
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        let p = CommandParser::new();
        assert_eq!(p.parse("/register"), BotCommand::Register);
        assert_eq!(p.parse("  /STATUS "), BotCommand::Status);
        assert_eq!(p.parse("/history"), BotCommand::History(None));
        assert_eq!(
            p.parse("/history @bob extra"),
            BotCommand::History(Some("@bob".into()))
        );
        assert_eq!(p.parse("/addpoints 10"), BotCommand::AddPoints(vec!["10".into()]));
        assert_eq!(
            p.parse("/addreward Ice Cream 5"),
            BotCommand::AddReward(vec!["Ice".into(), "Cream".into(), "5".into()])
        );
        assert_eq!(p.parse("/redeem"), BotCommand::Redeem);
        assert_eq!(p.parse("/start"), BotCommand::Help);
    }

    #[test]
    fn plain_text_and_unknown_commands_fall_through() {
        let p = CommandParser::new();
        assert_eq!(p.parse("hello there"), BotCommand::Other);
        assert_eq!(p.parse("/"), BotCommand::Other);
        assert_eq!(p.parse("/dance"), BotCommand::Other);
    }

    #[test]
    fn bot_mentions_are_respected() {
        let p = CommandParser::with_bot_username("@ChoreBot");
        assert_eq!(p.parse("/status@chorebot"), BotCommand::Status);
        assert_eq!(p.parse("/status@OtherBot"), BotCommand::Ignored);
        // Without a known handle any suffix is accepted.
        assert_eq!(CommandParser::new().parse("/redeem@x"), BotCommand::Redeem);
    }
}
