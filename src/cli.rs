use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use crate::banner::{
    analyze_banner, compose_prompt, extract_descriptor, BannerDescriptor, BannerField,
    CodecError, EncodedImage, FallbackReason,
};
use crate::llm::GeminiVisionClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Analyze {
        file_path: PathBuf,
        json: bool,
    },
    Compose {
        descriptor_path: PathBuf,
        width: u32,
        height: u32,
    },
}

fn usage() -> &'static str {
    "Usage:\n  banner_prompt_bot analyze --file <image> [--json]\n  banner_prompt_bot compose --descriptor <file.json> --width <px> --height <px>\nRun without arguments to start the Telegram bot."
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_dimension(value: &str, flag: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(anyhow!("Invalid {flag} value: {value}")),
    }
}

/// Returns `None` when no subcommand was given, meaning the bot should run.
pub fn parse_cli_args(args: &[String]) -> Result<Option<CliCommand>> {
    let Some(subcommand) = args.get(1).map(String::as_str) else {
        return Ok(None);
    };

    let mut file_path: Option<PathBuf> = None;
    let mut descriptor_path: Option<PathBuf> = None;
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;
    let mut json = false;

    match subcommand {
        "analyze" | "compose" => {}
        "--help" | "-h" | "help" => return Err(anyhow!(usage())),
        other => return Err(anyhow!("Unknown subcommand: {other}\n{}", usage())),
    }

    let mut index = 2;
    while index < args.len() {
        match (subcommand, args[index].as_str()) {
            ("analyze", "--file") => {
                file_path = Some(PathBuf::from(next_value(args, &mut index, "--file")?));
            }
            ("analyze", "--json") => json = true,
            ("compose", "--descriptor") => {
                descriptor_path = Some(PathBuf::from(next_value(
                    args,
                    &mut index,
                    "--descriptor",
                )?));
            }
            ("compose", "--width") => {
                width = Some(parse_dimension(
                    next_value(args, &mut index, "--width")?,
                    "--width",
                )?);
            }
            ("compose", "--height") => {
                height = Some(parse_dimension(
                    next_value(args, &mut index, "--height")?,
                    "--height",
                )?);
            }
            (_, "--help" | "-h") => return Err(anyhow!(usage())),
            (_, other) => {
                return Err(anyhow!(
                    "Unknown {subcommand} argument: {other}\n{}",
                    usage()
                ))
            }
        }
        index += 1;
    }

    let command = if subcommand == "analyze" {
        CliCommand::Analyze {
            file_path: file_path.ok_or_else(|| anyhow!("--file is required"))?,
            json,
        }
    } else {
        CliCommand::Compose {
            descriptor_path: descriptor_path.ok_or_else(|| anyhow!("--descriptor is required"))?,
            width: width.ok_or_else(|| anyhow!("--width is required"))?,
            height: height.ok_or_else(|| anyhow!("--height is required"))?,
        }
    };
    Ok(Some(command))
}

fn format_fields(descriptor: &BannerDescriptor) -> String {
    BannerField::ALL
        .iter()
        .map(|field| format!("{:<12} {}", format!("{}:", field.label()), descriptor.get(*field)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single JSON document printed by `analyze --json`.
fn analysis_report(
    descriptor: &BannerDescriptor,
    width: u32,
    height: u32,
    fallback: Option<&FallbackReason>,
) -> Value {
    json!({
        "descriptor": descriptor,
        "width": width,
        "height": height,
        "prompt": compose_prompt(descriptor, width, height),
        "fallback": fallback.map(|reason| reason.to_string()),
    })
}

/// Reads an image file, or a text file holding the base64 (or data URL) form.
fn load_image(bytes: &[u8]) -> Result<EncodedImage, CodecError> {
    match EncodedImage::from_upload(bytes) {
        Err(CodecError::Unsupported(mime_type)) => match std::str::from_utf8(bytes) {
            Ok(text) => EncodedImage::from_base64(text),
            Err(_) => Err(CodecError::Unsupported(mime_type)),
        },
        other => other,
    }
}

pub async fn run_cli(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Analyze { file_path, json } => {
            let bytes = tokio::fs::read(&file_path)
                .await
                .with_context(|| format!("Failed to read {}", file_path.display()))?;
            let image = load_image(&bytes)?;
            let client = GeminiVisionClient::from_config(None)?;
            let analysis = analyze_banner(&client, &image).await?;

            let fallback = analysis.outcome.fallback_reason();
            if let Some(reason) = fallback {
                eprintln!("note: model reply was not usable ({reason}); fields are blank");
                eprintln!("raw reply: {}", analysis.raw_text);
            }
            let descriptor = analysis.outcome.descriptor();
            if json {
                let report =
                    analysis_report(descriptor, image.width(), image.height(), fallback);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", format_fields(descriptor));
                println!();
                println!(
                    "{}",
                    compose_prompt(descriptor, image.width(), image.height())
                );
            }
        }
        CliCommand::Compose {
            descriptor_path,
            width,
            height,
        } => {
            let raw = tokio::fs::read_to_string(&descriptor_path)
                .await
                .with_context(|| format!("Failed to read {}", descriptor_path.display()))?;
            let outcome = extract_descriptor(&raw);
            if let Some(reason) = outcome.fallback_reason() {
                eprintln!("note: descriptor file was not usable ({reason}); fields are blank");
            }
            println!("{}", compose_prompt(outcome.descriptor(), width, height));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("banner_prompt_bot")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn no_subcommand_runs_the_bot() {
        assert_eq!(parse_cli_args(&args(&[])).unwrap(), None);
    }

    #[test]
    fn parses_analyze() {
        assert_eq!(
            parse_cli_args(&args(&["analyze", "--file", "banner.png", "--json"])).unwrap(),
            Some(CliCommand::Analyze {
                file_path: PathBuf::from("banner.png"),
                json: true,
            })
        );
        assert!(parse_cli_args(&args(&["analyze"])).is_err());
        assert!(parse_cli_args(&args(&["analyze", "--file"])).is_err());
    }

    #[test]
    fn parses_compose() {
        assert_eq!(
            parse_cli_args(&args(&[
                "compose",
                "--descriptor",
                "d.json",
                "--width",
                "1200",
                "--height",
                "628"
            ]))
            .unwrap(),
            Some(CliCommand::Compose {
                descriptor_path: PathBuf::from("d.json"),
                width: 1200,
                height: 628,
            })
        );
    }

    #[test]
    fn rejects_bad_flags_and_dimensions() {
        assert!(parse_cli_args(&args(&[
            "compose",
            "--descriptor",
            "d.json",
            "--width",
            "0",
            "--height",
            "5"
        ]))
        .is_err());
        assert!(
            parse_cli_args(&args(&["compose", "--descriptor", "d.json", "--width", "5"])).is_err()
        );
        assert!(parse_cli_args(&args(&["analyze", "--width", "5"])).is_err());
        assert!(parse_cli_args(&args(&["generate"])).is_err());
    }

    #[test]
    fn json_report_is_one_document_with_the_prompt() {
        let outcome = extract_descriptor(r#"{"ctaText":"Shop Now","styleDescription":"flat"}"#);
        let report = analysis_report(outcome.descriptor(), 1200, 628, outcome.fallback_reason());
        let printed = serde_json::to_string_pretty(&report).unwrap();

        let parsed: Value = serde_json::from_str(&printed).unwrap();
        assert_eq!(parsed["descriptor"]["ctaText"], "Shop Now");
        assert_eq!(parsed["width"], 1200);
        assert!(parsed["fallback"].is_null());
        assert!(parsed["prompt"]
            .as_str()
            .unwrap()
            .contains("aspect ratio 1200:628"));
    }

    #[test]
    fn json_report_names_the_fallback() {
        let outcome = extract_descriptor("no json here");
        let report = analysis_report(outcome.descriptor(), 10, 10, outcome.fallback_reason());
        assert!(report["fallback"].is_string());
        assert_eq!(report["descriptor"]["subText"], "");
    }

    #[test]
    fn loads_base64_text_files_as_images() {
        use base64::{engine::general_purpose, Engine as _};
        use image::{DynamicImage, RgbImage};

        let image =
            EncodedImage::from_image(&DynamicImage::ImageRgb8(RgbImage::new(7, 3))).unwrap();
        let text = format!("{}\n", general_purpose::STANDARD.encode(image.png_bytes()));

        let loaded = load_image(text.as_bytes()).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (7, 3));
        assert!(load_image(image.png_bytes()).is_ok());
        assert!(load_image(b"plain words, not an image").is_err());
    }

    #[test]
    fn formats_every_field_on_its_own_line() {
        let descriptor = BannerDescriptor {
            cta_text: "Shop Now".to_string(),
            ..Default::default()
        };
        let text = format_fields(&descriptor);
        assert_eq!(text.lines().count(), 8);
        assert!(text
            .lines()
            .any(|line| line.starts_with("CTA:") && line.ends_with(" Shop Now")));
    }
}
