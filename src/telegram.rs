//! Telegram front end
//!
//! Thin teloxide glue around [`ChatService`]: commands, the typing
//! indicator and splitting replies that exceed Telegram's message limit.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::bot::{ChatService, IncomingMessage, Reply};

/// Telegram's limit on the length of one message, in UTF-16 code units
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Show what I remember about you")]
    Profile,
}

/// Poll Telegram and answer messages until Ctrl+C
pub async fn run(bot: Bot, service: Arc<ChatService>) {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(message_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn sender(msg: &Message) -> Option<(i64, Option<String>)> {
    msg.from
        .as_ref()
        .map(|u| (u.id.0 as i64, u.language_code.clone()))
}

async fn message_handler(bot: Bot, msg: Message, service: Arc<ChatService>) -> ResponseResult<()> {
    let Some((user_id, language_code)) = sender(&msg) else {
        warn!("Received message without a sender; ignoring");
        return Ok(());
    };
    let mut incoming = IncomingMessage::new(user_id, msg.text().unwrap_or_default());
    incoming.language_code = language_code;

    answer_text(&bot, msg.chat.id, &incoming, &service).await
}

/// Show the typing indicator, run the turn and send the reply
///
/// A failed typing indicator is logged and the turn still runs.
async fn answer_text(
    bot: &Bot,
    chat_id: ChatId,
    incoming: &IncomingMessage,
    service: &ChatService,
) -> ResponseResult<()> {
    if service.is_allowed(incoming.user_id) {
        if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
            warn!("Failed to send typing action to {}: {}", chat_id, e);
        }
    }

    let reply = service.handle_message(incoming).await;
    send_long_message(bot, chat_id, reply.text()).await
}

async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<ChatService>,
) -> ResponseResult<()> {
    let Some((user_id, language_code)) = sender(&msg) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    info!("Command {:?} from user {}", cmd, user_id);

    let reply = match cmd {
        _ if !service.is_allowed(user_id) => Reply::Rejected,
        Command::Start => Reply::Answer(
            "Hi! I'm your home server assistant. I can request movies and series, \
             remember your preferences and answer questions about your services.\n\n\
             Use /help to see available commands."
                .to_string(),
        ),
        Command::Help => Reply::Answer(Command::descriptions().to_string()),
        Command::Profile => service.describe_profile(user_id, language_code.as_deref()).await,
    };

    send_long_message(&bot, chat_id, reply.text()).await
}

/// Send a long message, splitting if necessary
async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, MAX_MESSAGE_LENGTH) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

/// Length as Telegram counts it
fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Split `text` into chunks of at most `max_units` UTF-16 code units,
/// breaking at line ends where possible and never inside a character
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(2);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = utf16_len(line);
        if current_len + line_len > max_units && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_units {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        // A single line longer than the limit is cut hard
        for c in line.chars() {
            if current_len + c.len_utf16() > max_units {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += c.len_utf16();
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ModelResponse;
    use crate::bot::test_support::service;
    use serde_json::json;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:abc";

    fn bot_for(server: &MockServer) -> Bot {
        Bot::new(TOKEN).set_api_url(server.uri().parse().unwrap())
    }

    fn sent_texts(requests: &[wiremock::Request]) -> Vec<String> {
        requests
            .iter()
            .filter(|r| r.url.path().to_lowercase().ends_with("/sendmessage"))
            .filter_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
            .filter_map(|body| body["text"].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_typing_failure_still_answers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendchataction$"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "ok": false,
                "error_code": 500,
                "description": "Internal Server Error"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "message_id": 7,
                    "date": 0,
                    "chat": {"id": 42, "type": "private", "first_name": "Test"},
                    "text": "Hallo!"
                }
            })))
            .mount(&server)
            .await;

        let (service, history, _profiles, _dir) =
            service(vec![Ok(ModelResponse::from_text("Hallo!"))]).await;
        let incoming = IncomingMessage::new(100, "hoi");

        let _ = answer_text(&bot_for(&server), ChatId(42), &incoming, &service).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(sent_texts(&requests), vec!["Hallo!"]);
        assert_eq!(history.get_history(100).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_user_gets_no_typing_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (service, _history, _profiles, _dir) = service(vec![]).await;
        let incoming = IncomingMessage::new(999, "hello");
        let _ = answer_text(&bot_for(&server), ChatId(42), &incoming, &service).await;

        let requests = server.received_requests().await.unwrap();
        assert!(requests
            .iter()
            .all(|r| !r.url.path().to_lowercase().ends_with("/sendchataction")));
        assert_eq!(sent_texts(&requests), vec![crate::bot::REJECTION_MESSAGE]);
    }

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_split_prefers_line_breaks() {
        let chunks = split_message("aaaa\nbbbb\ncc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cc"]);
    }

    #[test]
    fn test_long_line_is_cut_by_characters() {
        let text = "é".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| utf16_len(c) <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_respects_telegram_limit() {
        let text = format!("{}\n{}", "x".repeat(5000), "y".repeat(100));
        let chunks = split_message(&text, MAX_MESSAGE_LENGTH);
        assert!(chunks.iter().all(|c| utf16_len(c) <= MAX_MESSAGE_LENGTH));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_emoji_count_as_two_units() {
        // 3000 characters, but 6000 UTF-16 code units
        let text = "\u{1F3AC}".repeat(3000);
        let chunks = split_message(&text, MAX_MESSAGE_LENGTH);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| utf16_len(c) <= MAX_MESSAGE_LENGTH));
        assert_eq!(chunks[0].chars().count(), 2048);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_surrogate_pair_is_never_split() {
        let text = format!("a{}", "\u{1F600}".repeat(3));
        let chunks = split_message(&text, 2);
        assert_eq!(chunks, vec!["a", "\u{1F600}", "\u{1F600}", "\u{1F600}"]);
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/profile", "home_agent_bot").unwrap(), Command::Profile);
        assert_eq!(Command::parse("/help@home_agent_bot", "home_agent_bot").unwrap(), Command::Help);
        assert!(Command::parse("/clear", "home_agent_bot").is_err());
    }
}
