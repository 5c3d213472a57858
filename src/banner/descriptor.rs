use serde::{Deserialize, Serialize};

/// Text and style content extracted from a banner. Every field is always
/// present; missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerDescriptor {
    pub sub_text: String,
    pub main_text_line1: String,
    pub decoration_text: String,
    pub main_text_line2: String,
    pub cta_text: String,
    pub style_description: String,
    pub objects_description: String,
    pub color_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerField {
    SubText,
    MainTextLine1,
    DecorationText,
    MainTextLine2,
    CtaText,
    StyleDescription,
    ObjectsDescription,
    ColorDescription,
}

impl BannerField {
    pub const ALL: [BannerField; 8] = [
        BannerField::SubText,
        BannerField::MainTextLine1,
        BannerField::DecorationText,
        BannerField::MainTextLine2,
        BannerField::CtaText,
        BannerField::StyleDescription,
        BannerField::ObjectsDescription,
        BannerField::ColorDescription,
    ];

    /// Key used in the model's JSON output.
    pub fn key(self) -> &'static str {
        match self {
            BannerField::SubText => "subText",
            BannerField::MainTextLine1 => "mainTextLine1",
            BannerField::DecorationText => "decorationText",
            BannerField::MainTextLine2 => "mainTextLine2",
            BannerField::CtaText => "ctaText",
            BannerField::StyleDescription => "styleDescription",
            BannerField::ObjectsDescription => "objectsDescription",
            BannerField::ColorDescription => "colorDescription",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            BannerField::SubText => "sub",
            BannerField::MainTextLine1 => "main1",
            BannerField::DecorationText => "deco",
            BannerField::MainTextLine2 => "main2",
            BannerField::CtaText => "cta",
            BannerField::StyleDescription => "style",
            BannerField::ObjectsDescription => "objects",
            BannerField::ColorDescription => "colors",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BannerField::SubText => "Sub text",
            BannerField::MainTextLine1 => "Main text 1",
            BannerField::DecorationText => "Decoration",
            BannerField::MainTextLine2 => "Main text 2",
            BannerField::CtaText => "CTA",
            BannerField::StyleDescription => "Style",
            BannerField::ObjectsDescription => "Objects",
            BannerField::ColorDescription => "Colors",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|field| {
            field.key().eq_ignore_ascii_case(name) || field.alias().eq_ignore_ascii_case(name)
        })
    }
}

impl BannerDescriptor {
    pub fn get(&self, field: BannerField) -> &str {
        match field {
            BannerField::SubText => &self.sub_text,
            BannerField::MainTextLine1 => &self.main_text_line1,
            BannerField::DecorationText => &self.decoration_text,
            BannerField::MainTextLine2 => &self.main_text_line2,
            BannerField::CtaText => &self.cta_text,
            BannerField::StyleDescription => &self.style_description,
            BannerField::ObjectsDescription => &self.objects_description,
            BannerField::ColorDescription => &self.color_description,
        }
    }

    pub fn set(&mut self, field: BannerField, value: impl Into<String>) {
        let slot = match field {
            BannerField::SubText => &mut self.sub_text,
            BannerField::MainTextLine1 => &mut self.main_text_line1,
            BannerField::DecorationText => &mut self.decoration_text,
            BannerField::MainTextLine2 => &mut self.main_text_line2,
            BannerField::CtaText => &mut self.cta_text,
            BannerField::StyleDescription => &mut self.style_description,
            BannerField::ObjectsDescription => &mut self.objects_description,
            BannerField::ColorDescription => &mut self.color_description,
        };
        *slot = value.into();
    }

    pub fn is_blank(&self) -> bool {
        BannerField::ALL
            .into_iter()
            .all(|field| self.get(field).trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn serializes_exactly_the_eight_wire_keys() {
        let value = serde_json::to_value(BannerDescriptor::default()).unwrap();
        let Value::Object(map) = value else {
            panic!("descriptor should serialize to an object");
        };
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let mut expected: Vec<&str> = BannerField::ALL.iter().map(|f| f.key()).collect();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert!(map.values().all(|v| v == &Value::String(String::new())));
    }

    #[test]
    fn parses_keys_and_aliases_case_insensitively() {
        assert_eq!(BannerField::parse("ctaText"), Some(BannerField::CtaText));
        assert_eq!(BannerField::parse("CTATEXT"), Some(BannerField::CtaText));
        assert_eq!(BannerField::parse(" Main2 "), Some(BannerField::MainTextLine2));
        assert_eq!(BannerField::parse("colors"), Some(BannerField::ColorDescription));
        assert_eq!(BannerField::parse("headline"), None);
    }

    #[test]
    fn set_replaces_only_the_named_field() {
        let mut descriptor = BannerDescriptor {
            sub_text: "Sale".to_string(),
            cta_text: "Buy".to_string(),
            ..Default::default()
        };
        descriptor.set(BannerField::CtaText, "Shop Now");
        assert_eq!(descriptor.get(BannerField::CtaText), "Shop Now");
        assert_eq!(descriptor.get(BannerField::SubText), "Sale");
        assert!(!descriptor.is_blank());
        assert!(BannerDescriptor::default().is_blank());
    }
}
