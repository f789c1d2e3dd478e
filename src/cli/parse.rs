//! CLI handler for dry-running field extraction.

use crate::config::Config;
use anyhow::{Context, Result};

use super::args::ParseCliArgs;

pub fn handle_parse_command(config: &Config, args: ParseCliArgs) -> Result<()> {
    println!("{}", parse_segments(config, &args)?);
    Ok(())
}

fn parse_segments(config: &Config, args: &ParseCliArgs) -> Result<String> {
    let extractor = config.parsing.extractor(args.trigger.as_deref())?;
    let fields = extractor.extract_fields(args.segments.as_slice());

    if fields.is_empty() {
        eprintln!(
            "No fields found (is the trigger phrase \"{}\" present?)",
            extractor.trigger_phrase()
        );
    }

    serde_json::to_string_pretty(&fields).context("Failed to serialize fields")
}
