use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::warn;

const TYPING_REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps the "typing…" indicator visible while a long call runs. Stops when
/// dropped.
pub struct TypingIndicator {
    task_handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        let task_handle = tokio::spawn(async move {
            loop {
                if let Err(err) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
                    warn!("send_chat_action failed: {err}");
                }
                tokio::time::sleep(TYPING_REFRESH_INTERVAL).await;
            }
        });

        Self {
            task_handle: Some(task_handle),
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"50% OFF" & more</b>"#),
            "&lt;b&gt;&quot;50% OFF&quot; &amp; more&lt;/b&gt;"
        );
    }
}
