use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tracing::{error, info, warn};

use crate::banner::{analyze_banner, BannerField, EncodedImage};
use crate::config::CONFIG;
use crate::handlers::access::{login_hint, require_login};
use crate::handlers::media::{fetch_image_upload, find_image_upload};
use crate::llm::GeminiVisionClient;
use crate::state::{AppState, BannerSession};
use crate::utils::telegram::{escape_html, TypingIndicator};
use crate::utils::timing::{complete_command_timer, start_command_timer};

const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Escaped length allowed per field in `/fields`, so eight fields fit one message.
const FIELD_VALUE_LIMIT: usize = 400;
const PRE_TAGS_LEN: usize = "<pre></pre>".len();
const NO_BANNER_TEXT: &str = "No banner analyzed yet. Send an image first.";

const HELP_TEXT: &str = "
*Banner Prompt Bot*

/login `<password>` - Unlock this chat (demo gate, not real security)
/apikey `<key>` - Use your own Gemini API key for this chat
Send a banner image (photo or PNG/JPG/WebP file) - Analyze it
/fields - Show the extracted fields
/set `<field> <value>` - Edit one field
Fields: sub, main1, deco, main2, cta, style, objects, colors
/prompt - Show the regenerated banner prompt
/reset - Forget the current banner
/logout - Close the session
/help - Show this help message
";

/// HTML-escapes `text`, cutting on character boundaries so the escaped form
/// stays within `max_chars`. Entities are never split.
fn escape_within(text: &str, max_chars: usize) -> String {
    let escaped = escape_html(text);
    if escaped.chars().count() <= max_chars {
        return escaped;
    }

    let budget = max_chars.saturating_sub(3);
    let mut out = String::new();
    let mut used = 0;
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let piece = escape_html(ch.encode_utf8(&mut buf));
        let len = piece.chars().count();
        if used + len > budget {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    out.push_str("...");
    out
}

fn pre_block(text: &str) -> String {
    format!(
        "<pre>{}</pre>",
        escape_within(text, TELEGRAM_MESSAGE_LIMIT - PRE_TAGS_LEN)
    )
}

pub fn render_fields(session: &BannerSession) -> String {
    let Some(descriptor) = session.descriptor.as_ref() else {
        return NO_BANNER_TEXT.to_string();
    };

    let mut text = String::from("<b>Fields</b>\n");
    for field in BannerField::ALL {
        let value = descriptor.get(field);
        let shown = if value.is_empty() { "(empty)" } else { value };
        text.push_str(&format!(
            "<b>{}</b> (<code>{}</code>): {}\n",
            field.label(),
            field.alias(),
            escape_within(shown, FIELD_VALUE_LIMIT)
        ));
    }
    text
}

pub fn render_prompt(session: &BannerSession) -> Option<String> {
    session
        .composed_prompt()
        .map(|prompt| pre_block(&prompt))
}

/// Fields, prompt and (when enabled) the fallback note, sized for Telegram.
pub fn render_session(session: &BannerSession, report_fallback: bool) -> String {
    let mut text = render_fields(session);
    if let Some(prompt) = render_prompt(session) {
        text.push('\n');
        text.push_str(&prompt);
    }
    if report_fallback {
        if let Some(reason) = session.last_fallback.as_ref() {
            text.push_str(&format!(
                "\n\n<i>The model reply could not be read ({}); fields were left blank.</i>",
                escape_html(&reason.to_string())
            ));
        }
    }

    if text.chars().count() <= TELEGRAM_MESSAGE_LIMIT {
        return text;
    }
    // Too long for one message: keep the prompt, which is what the user copies.
    render_prompt(session).unwrap_or_else(|| render_fields(session))
}

/// Splits `/set` arguments into a field and its new value.
pub fn parse_set_args(args: &str) -> Result<(BannerField, String), String> {
    let args = args.trim();
    let (name, value) = match args.split_once(char::is_whitespace) {
        Some((name, value)) => (name, value.trim()),
        None => (args, ""),
    };
    if name.is_empty() {
        return Err("Usage: /set <field> <value>".to_string());
    }
    let field = BannerField::parse(name).ok_or_else(|| {
        format!(
            "Unknown field '{name}'. Use one of: {}",
            BannerField::ALL
                .iter()
                .map(|field| field.alias())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;
    Ok((field, value.to_string()))
}

async fn send_html(bot: &Bot, chat_id: ChatId, reply_to: MessageId, text: String) -> Result<()> {
    bot.send_message(chat_id, text)
        .reply_parameters(ReplyParameters::new(reply_to))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn start_handler(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(
        message.chat.id,
        "Hello! I turn banner images into editable fields and a regeneration prompt. Use /help to see commands.",
    )
    .reply_parameters(ReplyParameters::new(message.id))
    .await?;
    Ok(())
}

#[allow(deprecated)]
pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(message.chat.id, HELP_TEXT)
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Markdown)
        .await?;
    Ok(())
}

/// Stores or clears the chat's key. Returns `None` when the chat is not logged in.
pub fn store_api_key(state: &AppState, chat_id: ChatId, key: &str) -> Option<&'static str> {
    if !state.is_authenticated(chat_id) {
        return None;
    }
    let key = key.trim();
    if key.is_empty() {
        state.with_session(chat_id, |session| session.api_key = None);
        Some("Session API key cleared; the server key will be used.")
    } else {
        state.with_session(chat_id, |session| session.api_key = Some(key.to_string()));
        Some("API key saved for this chat.")
    }
}

pub async fn apikey_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    key: String,
) -> Result<()> {
    let chat_id = message.chat.id;
    let reply = store_api_key(&state, chat_id, &key);
    if let Err(err) = bot.delete_message(chat_id, message.id).await {
        warn!("Could not delete /apikey message: {err}");
    }

    // The command message is gone, so neither reply can point at it.
    match reply {
        Some(text) => {
            bot.send_message(chat_id, text).await?;
        }
        None => {
            login_hint(&bot, chat_id, None).await?;
        }
    }
    Ok(())
}

pub async fn fields_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    if !require_login(&bot, &state, &message).await? {
        return Ok(());
    }
    let session = state.snapshot(message.chat.id);
    send_html(&bot, message.chat.id, message.id, render_fields(&session)).await
}

pub async fn prompt_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    if !require_login(&bot, &state, &message).await? {
        return Ok(());
    }
    let session = state.snapshot(message.chat.id);
    let text = render_prompt(&session).unwrap_or_else(|| NO_BANNER_TEXT.to_string());
    send_html(&bot, message.chat.id, message.id, text).await
}

pub async fn set_handler(bot: Bot, state: AppState, message: Message, args: String) -> Result<()> {
    if !require_login(&bot, &state, &message).await? {
        return Ok(());
    }

    let (field, value) = match parse_set_args(&args) {
        Ok(parsed) => parsed,
        Err(usage) => {
            bot.send_message(message.chat.id, usage)
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
            return Ok(());
        }
    };

    let reply = state.with_session(message.chat.id, |session| {
        if session.edit_field(field, &value) {
            render_prompt(session)
        } else {
            None
        }
    });
    let text = reply.unwrap_or_else(|| NO_BANNER_TEXT.to_string());
    send_html(&bot, message.chat.id, message.id, text).await
}

pub async fn reset_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    if !require_login(&bot, &state, &message).await? {
        return Ok(());
    }
    state.with_session(message.chat.id, BannerSession::reset_banner);
    bot.send_message(message.chat.id, "Banner cleared. Send a new image to start over.")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn upload_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let mut timer = start_command_timer("analyze", &message);
    if !require_login(&bot, &state, &message).await? {
        complete_command_timer(&mut timer, "denied", None);
        return Ok(());
    }
    let Some(upload) = find_image_upload(&message) else {
        complete_command_timer(&mut timer, "ignored", Some("no image".to_string()));
        return Ok(());
    };

    let chat_id = message.chat.id;
    let processing_message = bot
        .send_message(chat_id, "Analyzing the banner...")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    let typing = TypingIndicator::start(bot.clone(), chat_id);

    let result = async {
        let bytes = fetch_image_upload(&bot, &upload).await?;
        let image = EncodedImage::from_upload(&bytes)?;
        let session_key = state.with_session(chat_id, |session| session.api_key.clone());
        let client = GeminiVisionClient::from_config(session_key.as_deref())?;
        let analysis = analyze_banner(&client, &image).await?;
        Ok::<_, anyhow::Error>((image.dimensions(), analysis))
    }
    .await;
    drop(typing);

    let (dimensions, analysis) = match result {
        Ok(done) => done,
        Err(err) => {
            error!(chat_id = chat_id.0, "Banner analysis failed: {err}");
            let _ = bot
                .edit_message_text(
                    chat_id,
                    processing_message.id,
                    format!("Sorry, I couldn't analyze that image.\n\nError: {err}"),
                )
                .await;
            complete_command_timer(&mut timer, "error", Some(err.to_string()));
            return Ok(());
        }
    };

    info!(
        chat_id = chat_id.0,
        width = dimensions.width,
        height = dimensions.height,
        "Banner analyzed"
    );
    let text = state.with_session(chat_id, |session| {
        session.apply_analysis(dimensions, analysis);
        render_session(session, CONFIG.report_extraction_fallback)
    });

    let edited = bot
        .edit_message_text(chat_id, processing_message.id, text.clone())
        .parse_mode(ParseMode::Html)
        .await;
    if let Err(err) = edited {
        warn!("Failed to edit analysis message, sending a new one: {err}");
        send_html(&bot, chat_id, message.id, text).await?;
    }
    complete_command_timer(&mut timer, "success", None);
    Ok(())
}
