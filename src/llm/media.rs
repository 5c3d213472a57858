use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use tracing::warn;

use crate::utils::http::get_http_client;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

const MEDIA_DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const MEDIA_DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Fetches an uploaded file from Telegram's file endpoint. `label` is what
/// gets logged in place of the URL, which embeds the bot token.
pub async fn download_upload(url: &str, label: &str, max_bytes: usize) -> Result<Vec<u8>> {
    let client = get_http_client();
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let last_attempt = attempt == MEDIA_DOWNLOAD_MAX_ATTEMPTS;
        let delay = Duration::from_millis(MEDIA_DOWNLOAD_BASE_DELAY_MS << (attempt - 1));

        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    "Failed to fetch upload {label}: timeout={}, connect={}, attempt={}/{}",
                    err.is_timeout(),
                    err.is_connect(),
                    attempt,
                    MEDIA_DOWNLOAD_MAX_ATTEMPTS
                );
                if !should_retry_error(&err) || last_attempt {
                    return Err(anyhow!("Could not download {label}"));
                }
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Upload download failed for {label} with status {}: {}",
                status,
                truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
            );
            if !should_retry_status(status) || last_attempt {
                return Err(anyhow!("Could not download {label} (status {status})"));
            }
            tokio::time::sleep(delay).await;
            continue;
        }

        if let Some(length) = response.content_length() {
            if length as usize > max_bytes {
                return Err(anyhow!(
                    "{label} is {length} bytes, above the {max_bytes} byte limit"
                ));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| anyhow!("Failed to read {label}: timeout={}", err.is_timeout()))?;
        if bytes.len() > max_bytes {
            return Err(anyhow!(
                "{label} is {} bytes, above the {max_bytes} byte limit",
                bytes.len()
            ));
        }
        return Ok(bytes.to_vec());
    }
}
