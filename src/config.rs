use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

const DEFAULT_ACCESS_PASSWORD: &str = "배너를수정하자";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub access_password: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub gemini_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub report_extraction_fallback: bool,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn normalize_gemini_safety_settings(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    match trimmed.to_lowercase().as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

fn normalize_api_base(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "https://generativelanguage.googleapis.com".to_string()
    } else {
        trimmed.to_string()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let access_password = env_string("ACCESS_PASSWORD", DEFAULT_ACCESS_PASSWORD);
        if access_password.trim().is_empty() {
            return Err(anyhow::anyhow!("ACCESS_PASSWORD must not be empty"));
        }

        Ok(Config {
            bot_token: env_string("BOT_TOKEN", ""),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            access_password,
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_api_base: normalize_api_base(&env_string("GEMINI_API_BASE", "")),
            gemini_model: env_string("GEMINI_MODEL", "gemini-1.5-flash"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.4),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 1024),
            gemini_safety_settings: normalize_gemini_safety_settings(&env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            gemini_timeout_secs: env_u64("GEMINI_TIMEOUT_SECS", 90).max(1),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            report_extraction_fallback: env_bool("REPORT_EXTRACTION_FALLBACK", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_profile_aliases_collapse_to_known_values() {
        assert_eq!(normalize_gemini_safety_settings("OFF"), "permissive");
        assert_eq!(normalize_gemini_safety_settings(" standard "), "standard");
        assert_eq!(normalize_gemini_safety_settings(""), "permissive");
        assert_eq!(normalize_gemini_safety_settings("paranoid"), "permissive");
    }

    #[test]
    fn api_base_drops_trailing_slash() {
        assert_eq!(
            normalize_api_base("http://localhost:8080/"),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_api_base("  "),
            "https://generativelanguage.googleapis.com"
        );
    }
}
