//! Browsing (`ls`, `info`, `path`) and item management (`mkdir`, `rename`, `rm`).

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::drive::{build_breadcrumbs, DriveClient, DriveItem, PAGE_SIZE, ROOT_ID};
use crate::errors::{DrivemanError, Result};
use crate::format::{format_file_size, kind_label, modified_column, size_column};
use crate::output::{self, progress};
use crate::text::truncate;
use crate::tui;

const NAME_WIDTH: usize = 48;

// ---------------------------------------------------------------------------
// Command definitions
// ---------------------------------------------------------------------------

pub fn ls_command() -> Command {
    Command::new("ls")
        .about("List a folder (My Drive by default)")
        .arg(Arg::new("folder").value_name("FOLDER_ID").help("Folder to list"))
        .arg(
            Arg::new("search")
                .short('s')
                .long("search")
                .value_name("TEXT")
                .help("Only show items whose name contains TEXT"),
        )
}

pub fn info_command() -> Command {
    Command::new("info")
        .about("Show details of a file or folder")
        .arg(Arg::new("id").required(true).value_name("ID"))
}

pub fn path_command() -> Command {
    Command::new("path")
        .about("Show where a folder sits, from My Drive down")
        .arg(Arg::new("folder").required(true).value_name("FOLDER_ID"))
}

pub fn mkdir_command() -> Command {
    Command::new("mkdir")
        .about("Create a folder")
        .arg(Arg::new("name").required(true).value_name("NAME"))
        .arg(
            Arg::new("parent")
                .short('p')
                .long("parent")
                .value_name("FOLDER_ID")
                .help("Create inside this folder instead of My Drive"),
        )
}

pub fn rename_command() -> Command {
    Command::new("rename")
        .about("Rename a file or folder")
        .arg(Arg::new("id").required(true).value_name("ID"))
        .arg(Arg::new("name").required(true).value_name("NEW_NAME"))
}

pub fn rm_command() -> Command {
    Command::new("rm")
        .about("Move a file or folder to the trash")
        .arg(Arg::new("id").required(true).value_name("ID"))
        .arg(
            Arg::new("permanent")
                .long("permanent")
                .action(ArgAction::SetTrue)
                .help("Delete permanently instead of trashing"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .action(ArgAction::SetTrue)
                .help("Do not ask for confirmation"),
        )
}

fn authed(cmd: Command, category: CommandCategory) -> CommandBuilder {
    CommandBuilder::from_clap(cmd).category(category).requires_auth()
}

pub fn ls_meta() -> CommandMeta {
    authed(ls_command(), CommandCategory::Browse)
        .aliases(&["list"])
        .build()
}

pub fn info_meta() -> CommandMeta {
    authed(info_command(), CommandCategory::Browse).build()
}

pub fn path_meta() -> CommandMeta {
    authed(path_command(), CommandCategory::Browse).build()
}

pub fn mkdir_meta() -> CommandMeta {
    authed(mkdir_command(), CommandCategory::Files).build()
}

pub fn rename_meta() -> CommandMeta {
    authed(rename_command(), CommandCategory::Files)
        .aliases(&["mv"])
        .build()
}

pub fn rm_meta() -> CommandMeta {
    authed(rm_command(), CommandCategory::Files)
        .aliases(&["trash"])
        .build()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map(String::as_str).unwrap_or_default()
}

fn listing_rows(items: &[DriveItem]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| {
            let name = if item.is_folder() {
                format!("{}/", item.name)
            } else {
                item.name.clone()
            };
            vec![
                truncate(&name, NAME_WIDTH),
                kind_label(&item.mime_type).to_string(),
                size_column(item),
                modified_column(item),
                item.id.clone(),
            ]
        })
        .collect()
}

pub async fn handle_ls(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let folder = matches.get_one::<String>("folder").map(String::as_str);
    let search = matches.get_one::<String>("search").map(String::as_str);

    let items = drive.list_items(folder, search).await?;

    if wants_json(matches) {
        return output::json(&items);
    }

    if let Some(folder) = folder.filter(|f| !f.is_empty() && *f != ROOT_ID) {
        let crumbs = build_breadcrumbs(drive, folder).await?;
        output::info(&crumbs.display_path());
    }

    if items.is_empty() {
        match search {
            Some(s) if !s.trim().is_empty() => output::info(&format!("No items match \"{}\"", s.trim())),
            _ => output::info("This folder is empty"),
        }
        return Ok(());
    }

    println!(
        "{}",
        output::render_table(&["Name", "Kind", "Size", "Modified", "ID"], &listing_rows(&items))
    );
    if items.len() as u32 >= PAGE_SIZE {
        output::info(&format!("Showing the first {PAGE_SIZE} items"));
    }
    Ok(())
}

pub async fn handle_info(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let item = drive.get_item(arg(matches, "id")).await?;

    if wants_json(matches) {
        return output::json(&item);
    }

    output::key_value("Name", &item.name);
    output::key_value("ID", &item.id);
    output::key_value("Kind", kind_label(&item.mime_type));
    output::key_value("Type", &item.mime_type);
    if let Some(size) = item.size {
        output::key_value("Size", &format!("{} ({} bytes)", format_file_size(size), size));
    }
    output::key_value("Modified", &modified_column(&item));
    if let Some(parent) = item.parent() {
        output::key_value("Parent", parent);
    }
    if item.starred {
        output::key_value("Starred", "yes");
    }
    if item.shared {
        output::key_value("Shared", "yes");
    }
    if let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) {
        output::key_value("Description", desc);
    }
    if let Some(link) = &item.web_view_link {
        output::key_value("Link", link);
    }
    Ok(())
}

pub async fn handle_path(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let crumbs = build_breadcrumbs(drive, arg(matches, "folder")).await?;
    if wants_json(matches) {
        return output::json(&crumbs);
    }
    println!("{}", crumbs.display_path());
    Ok(())
}

pub async fn handle_mkdir(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let parent = matches.get_one::<String>("parent").map(String::as_str);
    let folder = drive.create_folder(arg(matches, "name"), parent).await?;

    if wants_json(matches) {
        return output::json(&folder);
    }
    output::success(&format!("Created folder \"{}\" ({})", folder.name, folder.id));
    Ok(())
}

pub async fn handle_rename(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let id = arg(matches, "id");
    let new_name = arg(matches, "name").trim();
    if new_name.is_empty() {
        return Err(DrivemanError::Validation("Name cannot be empty".into()));
    }

    let current = drive.get_item(id).await?;
    if current.name == new_name {
        if wants_json(matches) {
            return output::json(&current);
        }
        output::info("Name unchanged");
        return Ok(());
    }

    let renamed = drive.rename(id, new_name).await?;
    if wants_json(matches) {
        return output::json(&renamed);
    }
    output::success(&format!("Renamed \"{}\" to \"{}\"", current.name, renamed.name));
    Ok(())
}

pub async fn handle_rm(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let id = arg(matches, "id");
    let permanent = matches.get_flag("permanent");

    let item = drive.get_item(id).await?;
    let prompt = if permanent {
        format!("Permanently delete \"{}\"? This cannot be undone", item.name)
    } else {
        format!("Move \"{}\" to trash?", item.name)
    };
    if !tui::confirm_or_assume(&prompt, matches.get_flag("yes"))? {
        if wants_json(matches) {
            return output::json(&rm_json(&item, false, permanent));
        }
        output::info("Nothing deleted");
        return Ok(());
    }

    let spinner = progress::create_spinner("Deleting...");
    let result = if permanent {
        drive.delete(id).await
    } else {
        drive.trash(id).await.map(|_| ())
    };
    spinner.finish_and_clear();
    result?;

    if wants_json(matches) {
        return output::json(&rm_json(&item, true, permanent));
    }
    if permanent {
        output::success(&format!("\"{}\" deleted permanently", item.name));
    } else {
        output::success(&format!("\"{}\" moved to trash", item.name));
    }
    Ok(())
}

fn rm_json(item: &DriveItem, deleted: bool, permanent: bool) -> serde_json::Value {
    serde_json::json!({
        "id": item.id,
        "name": item.name,
        "deleted": deleted,
        "permanent": permanent,
    })
}
