//! `login`, `logout` and `status`.

use chrono::Utc;
use clap::{Arg, ArgMatches, Command};

use crate::auth::{self, AuthGate, OAuthFlow, TokenGrant};
use crate::cli::{wants_json, CommandBuilder, CommandCategory, CommandMeta};
use crate::commands::services::ServiceRegistry;
use crate::errors::Result;
use crate::output::{self, progress};
use crate::session::{AuthState, SessionStore};
use crate::tui;

pub fn login_command() -> Command {
    Command::new("login")
        .about("Sign in to your drive account")
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("ACCESS_TOKEN")
                .help("Use an access token obtained elsewhere instead of the consent flow"),
        )
        .arg(
            Arg::new("expires-in")
                .long("expires-in")
                .value_name("SECONDS")
                .requires("token")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Lifetime of --token in seconds (default 3600)"),
        )
}

pub fn logout_command() -> Command {
    Command::new("logout").about("Sign out and forget the stored session")
}

pub fn status_command() -> Command {
    Command::new("status").about("Show who is signed in and when the session expires")
}

pub fn login_meta() -> CommandMeta {
    CommandBuilder::from_clap(login_command())
        .category(CommandCategory::Auth)
        .build()
}

pub fn logout_meta() -> CommandMeta {
    CommandBuilder::from_clap(logout_command())
        .category(CommandCategory::Auth)
        .build()
}

pub fn status_meta() -> CommandMeta {
    CommandBuilder::from_clap(status_command())
        .category(CommandCategory::Auth)
        .aliases(&["whoami"])
        .build()
}

pub async fn handle_login(matches: &ArgMatches, services: &ServiceRegistry) -> Result<()> {
    let grant = match matches.get_one::<String>("token") {
        Some(token) => TokenGrant::new(token.as_str(), matches.get_one::<u64>("expires-in").copied())?,
        None => consent_flow(services).await?,
    };

    let session = services.session().await?;
    let drive = services.drive().await?;

    let spinner = progress::create_spinner("Fetching account profile...");
    let result = auth::complete_login(session, drive, &grant).await;
    spinner.finish_and_clear();
    let profile = result?;

    if wants_json(matches) {
        return output::json(&profile);
    }
    output::success(&format!("Logged in as {}", profile.display_name()));
    Ok(())
}

/// Print the consent URL, then read back the code or redirect URL.
async fn consent_flow(services: &ServiceRegistry) -> Result<TokenGrant> {
    let flow = OAuthFlow::from_config(&services.config().await)?;
    let pending = flow.authorize();

    output::info("Open this URL in your browser and approve access:");
    println!("\n  {}\n", pending.url);
    output::info("After approving, the browser is sent to a page that will not load.");
    let pasted = tui::text_input("Paste the address of that page (or just the authorization code)")?;

    let spinner = progress::create_spinner("Exchanging authorization code...");
    let grant = flow.exchange(pending, &pasted).await;
    spinner.finish_and_clear();
    grant
}

pub async fn handle_logout(session: &SessionStore) -> Result<()> {
    let was_signed_in = session.token()?.is_some();
    auth::logout(session)?;
    if was_signed_in {
        output::success("Logged out");
    } else {
        output::info("Already logged out");
    }
    Ok(())
}

/// Machine-readable view of the gate decision.
fn status_json(state: &AuthState) -> serde_json::Value {
    match state {
        AuthState::Authenticated(s) => serde_json::json!({
            "authenticated": true,
            "expiresAt": s.expires_at.to_rfc3339(),
            "user": s.user,
        }),
        AuthState::Expired => serde_json::json!({ "authenticated": false, "expired": true }),
        AuthState::Unauthenticated => {
            serde_json::json!({ "authenticated": false, "expired": false })
        }
    }
}

pub async fn handle_status(matches: &ArgMatches, session: &SessionStore) -> Result<()> {
    let gate = AuthGate::evaluate(session)?;

    if wants_json(matches) {
        return output::json(&status_json(gate.state()));
    }

    match gate.state() {
        AuthState::Authenticated(s) => {
            let who = match &s.user {
                Some(user) => match &user.email {
                    Some(email) if user.display_name() != email.as_str() => {
                        format!("{} <{}>", user.display_name(), email)
                    }
                    _ => user.display_name().to_string(),
                },
                None => "unknown user".to_string(),
            };
            output::success(&format!("Logged in as {who}"));
            let minutes = s.remaining_at(Utc::now()).num_minutes();
            output::key_value("Session expires in", &format!("{minutes} min"));
        }
        AuthState::Expired => {
            output::warning("Your session has expired. Run `driveman login` to sign in again.");
        }
        AuthState::Unauthenticated => {
            output::info("Not logged in. Run `driveman login` to sign in.");
        }
    }
    Ok(())
}
