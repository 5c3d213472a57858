use crate::banner::descriptor::BannerDescriptor;

/// Builds the regeneration prompt for a banner of the given pixel size.
pub fn compose_prompt(descriptor: &BannerDescriptor, width: u32, height: u32) -> String {
    [
        "Image Generation Prompt:".to_string(),
        format!("Create a banner ad with aspect ratio {width}:{height}."),
        format!(
            "TEXT: \"{}\" / \"{}\" / \"{}\" / CTA: \"{}\"",
            descriptor.sub_text,
            descriptor.main_text_line1,
            descriptor.main_text_line2,
            descriptor.cta_text
        ),
        format!("STYLE: {}", descriptor.style_description),
        format!("OBJECTS: {}", descriptor.objects_description),
    ]
    .join("\n")
}
