use anyhow::{anyhow, Result};
use teloxide::prelude::*;
use teloxide::types::FileId;

use crate::config::CONFIG;
use crate::llm::media::download_upload;

const IMAGE_FILE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".webp"];

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_id: FileId,
    pub size: u32,
    pub label: &'static str,
}

/// Finds the banner in a message: the largest photo size, or an image sent
/// as a document (which keeps the original resolution).
pub fn find_image_upload(message: &Message) -> Option<ImageUpload> {
    if let Some(photo) = message.photo().and_then(|sizes| sizes.last()) {
        return Some(ImageUpload {
            file_id: photo.file.id.clone(),
            size: photo.file.size,
            label: "photo",
        });
    }

    let document = message.document()?;
    let mime_is_image = document
        .mime_type
        .as_ref()
        .map(|mime| mime.essence_str().starts_with("image/"))
        .unwrap_or(false);
    let name_is_image = document
        .file_name
        .as_deref()
        .map(file_name_is_image)
        .unwrap_or(false);
    if !mime_is_image && !name_is_image {
        return None;
    }

    Some(ImageUpload {
        file_id: document.file.id.clone(),
        size: document.file.size,
        label: "image document",
    })
}

fn file_name_is_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_FILE_EXTENSIONS
        .iter()
        .any(|extension| lower.ends_with(extension))
}

pub fn message_has_image(message: &Message) -> bool {
    find_image_upload(message).is_some()
}

pub async fn fetch_image_upload(bot: &Bot, upload: &ImageUpload) -> Result<Vec<u8>> {
    let max_bytes = CONFIG.max_upload_bytes;
    if upload.size as usize > max_bytes {
        return Err(anyhow!(
            "The {} is {} bytes; the limit is {} bytes.",
            upload.label,
            upload.size,
            max_bytes
        ));
    }

    let file = bot.get_file(upload.file_id.clone()).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token, file.path
    );
    download_upload(&url, upload.label, max_bytes).await
}
