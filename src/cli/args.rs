use crate::config::CaptionSourceKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ditto")]
#[command(about = "Turns spoken meeting commands into issue tracker records", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Listen to captions and create issues (the default)
    Run(RunCliArgs),
    /// Extract fields from caption segments and print them as JSON
    Parse(ParseCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug, Default)]
pub struct RunCliArgs {
    /// Caption source, overriding [captions] source
    #[arg(long, value_enum)]
    pub source: Option<CaptionSourceKind>,
    /// Caption file to follow, overriding [captions] caption_file
    #[arg(long, value_name = "PATH")]
    pub caption_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ParseCliArgs {
    /// Trigger phrase, overriding [parsing] trigger_phrase
    #[arg(long)]
    pub trigger: Option<String>,
    /// Caption segments in spoken order
    #[arg(required = true)]
    pub segments: Vec<String>,
}
