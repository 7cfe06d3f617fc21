//! `version`: print the application version.

use clap::{ArgMatches, Command};

use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::errors::Result;
use crate::output;

pub fn version_command() -> Command {
    Command::new("version").about("Show version information")
}

pub fn version_meta() -> CommandMeta {
    CommandBuilder::from_clap(version_command())
        .category(CommandCategory::Core)
        .build()
}

fn version_info() -> serde_json::Value {
    serde_json::json!({
        "name": "driveman",
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub fn handle_version(matches: &ArgMatches) -> Result<()> {
    if wants_json(matches) {
        output::json(&version_info())
    } else {
        println!("driveman version {}", env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}
