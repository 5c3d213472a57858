use std::future::Future;

use tracing::{info, warn};

use crate::banner::codec::EncodedImage;
use crate::banner::extract::{extract_descriptor, ParseOutcome};

pub const ANALYSIS_INSTRUCTION: &str = r#"Analyze this advertisement banner image in detail. Respond with JSON only, no commentary, using exactly these keys:
{
    "subText": "secondary text",
    "mainTextLine1": "first line of the main text",
    "decorationText": "decorative phrase",
    "mainTextLine2": "second line of the main text",
    "ctaText": "call-to-action button text",
    "styleDescription": "description of the design style",
    "objectsDescription": "main objects in the image",
    "colorDescription": "color palette"
}
Use an empty string for anything that is not present in the banner."#;

#[derive(Debug, thiserror::Error)]
#[error("Banner analysis failed: {0}")]
pub struct AnalysisError(pub String);

/// A hosted multimodal model that can describe a PNG image in text.
pub trait VisionBackend {
    fn describe_image(
        &self,
        instruction: &str,
        image: &EncodedImage,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct BannerAnalysis {
    pub outcome: ParseOutcome,
    pub raw_text: String,
}

pub async fn analyze_banner<B: VisionBackend>(
    backend: &B,
    image: &EncodedImage,
) -> Result<BannerAnalysis, AnalysisError> {
    let raw_text = backend
        .describe_image(ANALYSIS_INSTRUCTION, image)
        .await
        .map_err(|err| AnalysisError(err.to_string()))?;

    let outcome = extract_descriptor(&raw_text);
    match outcome.fallback_reason() {
        Some(reason) => warn!(
            model = backend.model_name(),
            width = image.width(),
            height = image.height(),
            "Banner extraction fell back to empty fields: {}",
            reason
        ),
        None => info!(
            model = backend.model_name(),
            width = image.width(),
            height = image.height(),
            blank = outcome.descriptor().is_blank(),
            "Banner analysis parsed"
        ),
    }

    Ok(BannerAnalysis { outcome, raw_text })
}
