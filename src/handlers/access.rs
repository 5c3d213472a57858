//! Demo-only password gate. The password is a shared plaintext string from
//! `ACCESS_PASSWORD`; this keeps casual visitors out and is not authentication.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ReplyParameters};
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::state::AppState;
use crate::utils::timing::{complete_command_timer, start_command_timer};

pub fn password_matches(candidate: &str, expected: &str) -> bool {
    !expected.is_empty() && candidate.trim() == expected
}

pub const LOGIN_HINT: &str = "This tool is password protected. Send /login <password> first.";

/// Builds the login hint. Pass `None` when the triggering message was deleted.
pub fn login_hint(
    bot: &Bot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
) -> <Bot as Requester>::SendMessage {
    let request = bot.send_message(chat_id, LOGIN_HINT);
    match reply_to {
        Some(message_id) => request.reply_parameters(ReplyParameters::new(message_id)),
        None => request,
    }
}

/// Replies with a login hint and returns false when the chat is not logged in.
pub async fn require_login(bot: &Bot, state: &AppState, message: &Message) -> Result<bool> {
    if state.is_authenticated(message.chat.id) {
        return Ok(true);
    }

    login_hint(bot, message.chat.id, Some(message.id)).await?;
    Ok(false)
}

pub async fn login_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    password: String,
) -> Result<()> {
    let mut timer = start_command_timer("login", &message);

    // The password should not linger in the chat history.
    if let Err(err) = bot.delete_message(message.chat.id, message.id).await {
        warn!("Could not delete /login message: {err}");
    }

    if password_matches(&password, &CONFIG.access_password) {
        state.with_session(message.chat.id, |session| session.authenticated = true);
        info!(chat_id = message.chat.id.0, "Session unlocked");
        bot.send_message(
            message.chat.id,
            "Unlocked. Send a banner image (PNG, JPG or WebP) to analyze it.",
        )
        .await?;
        complete_command_timer(&mut timer, "success", None);
    } else {
        warn!(chat_id = message.chat.id.0, "Rejected login attempt");
        bot.send_message(message.chat.id, "Wrong password.").await?;
        complete_command_timer(&mut timer, "denied", None);
    }
    Ok(())
}

pub async fn logout_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    state.end_session(message.chat.id);
    bot.send_message(message.chat.id, "Session closed. Send /login <password> to start again.")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::requests::HasPayload;

    #[test]
    fn compares_trimmed_candidate_exactly() {
        assert!(password_matches(" banner ", "banner"));
        assert!(!password_matches("Banner", "banner"));
        assert!(!password_matches("", ""));
    }

    #[test]
    fn login_hint_replies_only_when_asked() {
        let bot = Bot::new("123:test");
        let chat_id = ChatId(42);

        let standalone = login_hint(&bot, chat_id, None);
        assert!(standalone.payload_ref().reply_parameters.is_none());
        assert_eq!(standalone.payload_ref().text, LOGIN_HINT);

        let reply = login_hint(&bot, chat_id, Some(MessageId(7)));
        assert_eq!(
            reply
                .payload_ref()
                .reply_parameters
                .as_ref()
                .map(|params| params.message_id),
            Some(MessageId(7))
        );
    }
}
