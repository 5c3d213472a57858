use serde_json::Value;

use crate::banner::descriptor::BannerDescriptor;

/// Why the model output could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackReason {
    #[error("model returned no text")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("model output has an unexpected shape: {0}")]
    UnexpectedSchema(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(BannerDescriptor),
    Fallback {
        descriptor: BannerDescriptor,
        reason: FallbackReason,
    },
}

impl ParseOutcome {
    fn fallback(reason: FallbackReason) -> Self {
        ParseOutcome::Fallback {
            descriptor: BannerDescriptor::default(),
            reason,
        }
    }

    pub fn descriptor(&self) -> &BannerDescriptor {
        match self {
            ParseOutcome::Parsed(descriptor) => descriptor,
            ParseOutcome::Fallback { descriptor, .. } => descriptor,
        }
    }

    pub fn into_descriptor(self) -> BannerDescriptor {
        match self {
            ParseOutcome::Parsed(descriptor) => descriptor,
            ParseOutcome::Fallback { descriptor, .. } => descriptor,
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Removes markdown code-fence markers anywhere in the text and trims it.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns raw model text into a descriptor. Never fails: anything that is not
/// a JSON object of string fields collapses into the all-empty descriptor.
pub fn extract_descriptor(raw: &str) -> ParseOutcome {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return ParseOutcome::fallback(FallbackReason::EmptyResponse);
    }

    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        Err(err) => return ParseOutcome::fallback(FallbackReason::MalformedJson(err.to_string())),
    };

    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return ParseOutcome::fallback(FallbackReason::UnexpectedSchema(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    // Explicit nulls count as missing.
    map.retain(|_, value| !value.is_null());

    match serde_json::from_value::<BannerDescriptor>(Value::Object(map)) {
        Ok(descriptor) => ParseOutcome::Parsed(descriptor),
        Err(err) => ParseOutcome::fallback(FallbackReason::UnexpectedSchema(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALE_JSON: &str = r#"{"subText":"Sale","mainTextLine1":"50% OFF","decorationText":"","mainTextLine2":"Today Only","ctaText":"Shop Now","styleDescription":"bold red","objectsDescription":"shoes","colorDescription":"red/white"}"#;

    fn sale_descriptor() -> BannerDescriptor {
        BannerDescriptor {
            sub_text: "Sale".to_string(),
            main_text_line1: "50% OFF".to_string(),
            decoration_text: String::new(),
            main_text_line2: "Today Only".to_string(),
            cta_text: "Shop Now".to_string(),
            style_description: "bold red".to_string(),
            objects_description: "shoes".to_string(),
            color_description: "red/white".to_string(),
        }
    }

    #[test]
    fn returns_values_from_well_formed_json_unchanged() {
        assert_eq!(
            extract_descriptor(SALE_JSON),
            ParseOutcome::Parsed(sale_descriptor())
        );
    }

    #[test]
    fn fenced_json_matches_unfenced_json() {
        let fenced = format!("```json\n{SALE_JSON}\n```");
        assert_eq!(extract_descriptor(&fenced), extract_descriptor(SALE_JSON));

        let padded = format!("  \n```\n{SALE_JSON}```  \n");
        assert_eq!(extract_descriptor(&padded), extract_descriptor(SALE_JSON));
    }

    #[test]
    fn fence_stripping_is_idempotent() {
        let fenced = format!("```json\n{SALE_JSON}\n```");
        let once = strip_code_fences(&fenced);
        assert_eq!(strip_code_fences(&once), once);
    }

    #[test]
    fn prose_falls_back_to_empty_descriptor() {
        let outcome = extract_descriptor("I cannot process this image.");
        assert!(matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::MalformedJson(_))
        ));
        assert_eq!(outcome.into_descriptor(), BannerDescriptor::default());
    }

    #[test]
    fn empty_and_fence_only_text_fall_back() {
        for raw in ["", "   \n", "```json\n```"] {
            let outcome = extract_descriptor(raw);
            assert_eq!(
                outcome.fallback_reason(),
                Some(&FallbackReason::EmptyResponse),
                "raw: {raw:?}"
            );
            assert!(outcome.descriptor().is_blank());
        }
    }

    #[test]
    fn truncated_json_never_yields_partial_data() {
        let truncated = &SALE_JSON[..SALE_JSON.len() / 2];
        let outcome = extract_descriptor(truncated);
        assert!(outcome.fallback_reason().is_some());
        assert_eq!(outcome.into_descriptor(), BannerDescriptor::default());
    }

    #[test]
    fn non_object_json_is_an_unexpected_schema() {
        let outcome = extract_descriptor(r#"["Sale", "50% OFF"]"#);
        assert!(matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::UnexpectedSchema(_))
        ));
    }

    #[test]
    fn non_string_field_values_fall_back() {
        let outcome = extract_descriptor(r#"{"subText": 42, "ctaText": "Go"}"#);
        assert!(matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::UnexpectedSchema(_))
        ));
        assert!(outcome.descriptor().is_blank());
    }

    #[test]
    fn missing_and_null_keys_read_as_empty_strings() {
        let outcome =
            extract_descriptor(r#"{"subText":"Hi","ctaText":null,"extraKey":"ignored"}"#);
        let expected = BannerDescriptor {
            sub_text: "Hi".to_string(),
            ..Default::default()
        };
        assert_eq!(outcome, ParseOutcome::Parsed(expected));
    }
}
