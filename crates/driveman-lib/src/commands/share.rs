//! `share`: grant another account access to an item.

use clap::{Arg, ArgMatches, Command};

use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::drive::share::{share_link, validate_email};
use crate::drive::{DriveClient, ShareRole};
use crate::errors::Result;
use crate::output;

pub fn share_command() -> Command {
    Command::new("share")
        .about("Share a file or folder with someone by email")
        .arg(Arg::new("id").required(true).value_name("ID"))
        .arg(Arg::new("email").required(true).value_name("EMAIL"))
        .arg(
            Arg::new("role")
                .short('r')
                .long("role")
                .value_name("ROLE")
                .default_value("reader")
                .help("reader, writer or commenter"),
        )
}

pub fn share_meta() -> CommandMeta {
    CommandBuilder::from_clap(share_command())
        .category(CommandCategory::Sharing)
        .requires_auth()
        .build()
}

pub async fn handle_share(matches: &ArgMatches, drive: &DriveClient) -> Result<()> {
    let id = matches.get_one::<String>("id").map(String::as_str).unwrap_or_default();
    let email = validate_email(
        matches.get_one::<String>("email").map(String::as_str).unwrap_or_default(),
    )?;
    let role: ShareRole = matches
        .get_one::<String>("role")
        .map(String::as_str)
        .unwrap_or("reader")
        .parse()?;

    let permission = drive.share(id, email, role).await?;
    let link = share_link(id);

    if wants_json(matches) {
        return output::json(&serde_json::json!({
            "permission": permission,
            "link": link,
        }));
    }
    output::success(&format!("Shared with {email} as {role}"));
    output::key_value("Link", &link);
    Ok(())
}
