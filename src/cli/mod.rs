pub mod args;
pub mod parse;

pub use args::{Cli, CliCommand, ParseCliArgs, RunCliArgs};
pub use parse::handle_parse_command;

use crate::app::RunOptions;

impl From<RunCliArgs> for RunOptions {
    fn from(args: RunCliArgs) -> Self {
        Self {
            source: args.source,
            caption_file: args.caption_file,
        }
    }
}
