use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::types::ChatId;

use crate::banner::{
    compose_prompt, BannerAnalysis, BannerDescriptor, BannerField, FallbackReason,
    ImageDimensions,
};

/// Everything one chat knows about its current banner. Lives only in memory.
#[derive(Debug, Clone, Default)]
pub struct BannerSession {
    pub authenticated: bool,
    pub api_key: Option<String>,
    pub image: Option<ImageDimensions>,
    pub descriptor: Option<BannerDescriptor>,
    pub last_fallback: Option<FallbackReason>,
}

impl BannerSession {
    pub fn apply_analysis(&mut self, image: ImageDimensions, analysis: BannerAnalysis) {
        self.last_fallback = analysis.outcome.fallback_reason().cloned();
        self.descriptor = Some(analysis.outcome.into_descriptor());
        self.image = Some(image);
    }

    /// Returns false when nothing has been analyzed yet.
    pub fn edit_field(&mut self, field: BannerField, value: &str) -> bool {
        match self.descriptor.as_mut() {
            Some(descriptor) => {
                descriptor.set(field, value.trim());
                true
            }
            None => false,
        }
    }

    pub fn composed_prompt(&self) -> Option<String> {
        let descriptor = self.descriptor.as_ref()?;
        let image = self.image?;
        Some(compose_prompt(descriptor, image.width, image.height))
    }

    pub fn reset_banner(&mut self) {
        self.image = None;
        self.descriptor = None;
        self.last_fallback = None;
    }
}

#[derive(Clone, Default)]
pub struct AppState {
    sessions: Arc<Mutex<HashMap<ChatId, BannerSession>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the chat's session, creating an empty one on first use.
    pub fn with_session<R>(&self, chat_id: ChatId, f: impl FnOnce(&mut BannerSession) -> R) -> R {
        let mut sessions = self.sessions.lock();
        f(sessions.entry(chat_id).or_default())
    }

    pub fn snapshot(&self, chat_id: ChatId) -> BannerSession {
        self.with_session(chat_id, |session| session.clone())
    }

    pub fn is_authenticated(&self, chat_id: ChatId) -> bool {
        self.with_session(chat_id, |session| session.authenticated)
    }

    pub fn end_session(&self, chat_id: ChatId) {
        self.sessions.lock().remove(&chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::extract_descriptor;

    fn analysis(raw: &str) -> BannerAnalysis {
        BannerAnalysis {
            outcome: extract_descriptor(raw),
            raw_text: raw.to_string(),
        }
    }

    #[test]
    fn sessions_are_isolated_per_chat() {
        let state = AppState::new();
        state.with_session(ChatId(1), |session| session.authenticated = true);
        assert!(state.is_authenticated(ChatId(1)));
        assert!(!state.is_authenticated(ChatId(2)));

        state.end_session(ChatId(1));
        assert!(!state.is_authenticated(ChatId(1)));
    }

    #[test]
    fn analysis_replaces_descriptor_and_edits_touch_one_field() {
        let mut session = BannerSession::default();
        assert!(!session.edit_field(BannerField::CtaText, "Go"));
        assert!(session.composed_prompt().is_none());

        session.apply_analysis(
            ImageDimensions {
                width: 1200,
                height: 628,
            },
            analysis(r#"{"subText":"Sale","ctaText":"Shop Now"}"#),
        );
        assert!(session.last_fallback.is_none());
        assert!(session.edit_field(BannerField::CtaText, "  Buy today "));

        let descriptor = session.descriptor.as_ref().unwrap();
        assert_eq!(descriptor.cta_text, "Buy today");
        assert_eq!(descriptor.sub_text, "Sale");

        let prompt = session.composed_prompt().unwrap();
        assert!(prompt.contains("1200:628"));
        assert!(prompt.contains("CTA: \"Buy today\""));
    }

    #[test]
    fn fallback_is_recorded_and_cleared_on_reset() {
        let mut session = BannerSession::default();
        session.apply_analysis(
            ImageDimensions {
                width: 10,
                height: 10,
            },
            analysis("no json here"),
        );
        assert!(session.last_fallback.is_some());
        assert_eq!(session.descriptor, Some(BannerDescriptor::default()));

        session.reset_banner();
        assert!(session.descriptor.is_none());
        assert!(session.last_fallback.is_none());
    }
}
