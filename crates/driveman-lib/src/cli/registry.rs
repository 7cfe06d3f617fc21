use clap::Command;
use serde::Serialize;
use std::fmt;

use crate::errors::{DrivemanError, Result};

/// Groups used when listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    Auth,
    Browse,
    Files,
    Transfer,
    Sharing,
    Core,
}

impl CommandCategory {
    /// All categories in display order.
    pub fn all() -> &'static [CommandCategory] {
        &[
            CommandCategory::Auth,
            CommandCategory::Browse,
            CommandCategory::Files,
            CommandCategory::Transfer,
            CommandCategory::Sharing,
            CommandCategory::Core,
        ]
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandCategory::Auth => "auth",
            CommandCategory::Browse => "browse",
            CommandCategory::Files => "files",
            CommandCategory::Transfer => "transfer",
            CommandCategory::Sharing => "sharing",
            CommandCategory::Core => "core",
        };
        f.write_str(label)
    }
}

/// A registered subcommand and its listing metadata.
#[derive(Debug, Clone)]
pub struct CommandMeta {
    pub name: String,
    pub category: CommandCategory,
    pub description: String,
    pub aliases: Vec<String>,
    pub requires_auth: bool,
    pub command: Command,
}

/// Subcommands in registration order, grouped by category for listings.
pub struct CommandRegistry {
    commands: Vec<CommandMeta>,
    root: Command,
}

impl CommandRegistry {
    pub fn new(root: Command) -> Self {
        Self {
            commands: Vec::new(),
            root,
        }
    }

    /// Add a command. Names and aliases must be unique across the registry.
    pub fn register(&mut self, meta: CommandMeta) -> Result<()> {
        let clash = self.commands.iter().find(|m| {
            m.name == meta.name
                || m.aliases.contains(&meta.name)
                || meta.aliases.iter().any(|a| *a == m.name || m.aliases.contains(a))
        });
        if let Some(existing) = clash {
            return Err(DrivemanError::Command(format!(
                "duplicate command name: {} (clashes with {})",
                meta.name, existing.name
            )));
        }
        self.commands.push(meta);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandMeta> {
        self.commands
            .iter()
            .find(|m| m.name == name || m.aliases.iter().any(|a| a == name))
    }

    pub fn get_by_category(&self, cat: CommandCategory) -> Vec<&CommandMeta> {
        self.commands.iter().filter(|m| m.category == cat).collect()
    }

    /// Grouped plain-text listing, one line per command.
    pub fn render_listing(&self) -> String {
        let mut out = String::new();
        for cat in CommandCategory::all() {
            let cmds = self.get_by_category(*cat);
            if cmds.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{}:\n", cat));
            for cmd in cmds {
                out.push_str(&format!("  {:<12} {}\n", cmd.name, cmd.description));
            }
        }
        out
    }

    /// Grouped listing as JSON: `{ "files": [{"name": .., "description": ..}] }`.
    pub fn listing_json(&self) -> serde_json::Value {
        let mut output = serde_json::Map::new();
        for cat in CommandCategory::all() {
            let entries: Vec<serde_json::Value> = self
                .get_by_category(*cat)
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": m.name,
                        "description": m.description,
                        "aliases": m.aliases,
                        "requiresAuth": m.requires_auth,
                    })
                })
                .collect();
            if !entries.is_empty() {
                output.insert(cat.to_string(), serde_json::Value::Array(entries));
            }
        }
        serde_json::Value::Object(output)
    }

    /// The root clap command with every registered subcommand attached.
    pub fn root_command(&self) -> Command {
        self.commands
            .iter()
            .fold(self.root.clone(), |root, meta| root.subcommand(meta.command.clone()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.iter().map(|m| m.name.clone()).collect();
        names.sort();
        names
    }
}

/// Builder for [`CommandMeta`].
pub struct CommandBuilder {
    category: CommandCategory,
    aliases: Vec<String>,
    requires_auth: bool,
    command: Command,
}

impl CommandBuilder {
    /// Start from a clap command; name and description come from it.
    pub fn from_clap(cmd: Command) -> Self {
        Self {
            category: CommandCategory::Core,
            aliases: Vec::new(),
            requires_auth: false,
            command: cmd,
        }
    }

    pub fn category(mut self, cat: CommandCategory) -> Self {
        self.category = cat;
        self
    }

    /// Visible aliases, applied to the clap command as well.
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Mark the command as needing a valid session before it runs.
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn build(self) -> CommandMeta {
        let name = self.command.get_name().to_string();
        let description = self
            .command
            .get_about()
            .map(|s| s.to_string())
            .unwrap_or_default();
        let command = self.command.visible_aliases(self.aliases.clone());

        CommandMeta {
            name,
            category: self.category,
            description,
            aliases: self.aliases,
            requires_auth: self.requires_auth,
            command,
        }
    }
}
