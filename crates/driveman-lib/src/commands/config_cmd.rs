//! `config`: view and modify `config.json`.
//!
//! Named `config_cmd` to avoid conflict with the `config` module.

use clap::{Arg, ArgMatches, Command};

use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::config::manager::DynamicConfigManager;
use crate::errors::Result;
use crate::output;

const SECRET_KEYS: [&str; 1] = ["clientSecret"];

pub fn config_command() -> Command {
    Command::new("config")
        .about("Show or change settings")
        .subcommand(Command::new("show").about("Print the current settings (default)"))
        .subcommand(
            Command::new("set")
                .about("Change one setting")
                .arg(Arg::new("key").required(true).help("Setting name, e.g. clientId"))
                .arg(Arg::new("value").required(true).help("New value")),
        )
        .subcommand(Command::new("reset").about("Restore every setting to its default"))
        .subcommand(Command::new("path").about("Print the location of config.json"))
}

pub fn config_meta() -> CommandMeta {
    CommandBuilder::from_clap(config_command())
        .category(CommandCategory::Core)
        .aliases(&["conf"])
        .build()
}

pub async fn handle_config(matches: &ArgMatches, config_mgr: &DynamicConfigManager) -> Result<()> {
    match matches.subcommand() {
        Some(("set", sub)) => {
            let key = sub.get_one::<String>("key").map(String::as_str).unwrap_or_default();
            let value = sub.get_one::<String>("value").map(String::as_str).unwrap_or_default();
            config_mgr.set_value(key, value).await?;
            output::success(&format!("Updated {key}"));
            Ok(())
        }
        Some(("reset", _)) => {
            config_mgr.reset_to_defaults().await?;
            output::success("Settings reset to defaults");
            Ok(())
        }
        Some(("path", _)) => {
            println!("{}", config_mgr.config_path().display());
            Ok(())
        }
        _ => {
            let shown = redacted(serde_json::to_value(config_mgr.get_config().await)?);
            if wants_json(matches) {
                output::json(&shown)
            } else {
                if let Some(obj) = shown.as_object() {
                    for (key, value) in obj {
                        let text = match value {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        output::key_value(key, &text);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Mask secrets for display. Empty secrets stay empty so "not set" is visible.
fn redacted(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = value.as_object_mut() {
        for key in SECRET_KEYS {
            if let Some(serde_json::Value::String(s)) = obj.get_mut(key) {
                if !s.is_empty() {
                    *s = "********".into();
                }
            }
        }
    }
    value
}
