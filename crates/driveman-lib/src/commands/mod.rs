pub mod auth_cmd;
pub mod config_cmd;
pub mod files;
pub mod services;
pub mod share;
pub mod transfer;
pub mod version;

use clap::ArgMatches;

use crate::auth::AuthGate;
use crate::cli::{CommandMeta, CommandRegistry};
use crate::config::SimplifiedConfig;
use crate::errors::{DrivemanError, Result};

pub use services::ServiceRegistry;

/// Register every driveman subcommand, grouped by category.
pub fn register_commands(registry: &mut CommandRegistry) -> Result<()> {
    let metas = [
        auth_cmd::login_meta(),
        auth_cmd::logout_meta(),
        auth_cmd::status_meta(),
        files::ls_meta(),
        files::info_meta(),
        files::path_meta(),
        files::mkdir_meta(),
        files::rename_meta(),
        files::rm_meta(),
        transfer::upload_meta(),
        transfer::download_meta(),
        share::share_meta(),
        config_cmd::config_meta(),
        version::version_meta(),
    ];
    for meta in metas {
        registry.register(meta)?;
    }
    Ok(())
}

/// Run the auth gate once for commands that need a session, then hand off to
/// the command's handler.
pub async fn dispatch_command(
    meta: &CommandMeta,
    matches: &ArgMatches,
    services: &ServiceRegistry,
) -> Result<()> {
    if meta.requires_auth {
        let session = services.session().await?;
        AuthGate::evaluate(session)?.require()?;
    }

    match meta.name.as_str() {
        "login" => auth_cmd::handle_login(matches, services).await,
        "logout" => auth_cmd::handle_logout(services.session().await?).await,
        "status" => auth_cmd::handle_status(matches, services.session().await?).await,
        "ls" => files::handle_ls(matches, services.drive().await?).await,
        "info" => files::handle_info(matches, services.drive().await?).await,
        "path" => files::handle_path(matches, services.drive().await?).await,
        "mkdir" => files::handle_mkdir(matches, services.drive().await?).await,
        "rename" => files::handle_rename(matches, services.drive().await?).await,
        "rm" => files::handle_rm(matches, services.drive().await?).await,
        "upload" => {
            transfer::handle_upload(matches, services.drive().await?, &services.shutdown()).await
        }
        "download" => {
            transfer::handle_download(
                matches,
                services.drive().await?,
                &SimplifiedConfig::get().download_dir,
                &services.shutdown(),
            )
            .await
        }
        "share" => share::handle_share(matches, services.drive().await?).await,
        "config" => config_cmd::handle_config(matches, &services.config_manager).await,
        "version" => version::handle_version(matches),
        other => Err(DrivemanError::Command(format!("unknown command: {other}"))),
    }
}
