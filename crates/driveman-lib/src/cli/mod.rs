pub mod registry;

pub use registry::{CommandBuilder, CommandCategory, CommandMeta, CommandRegistry};

/// Creates the root clap Command with global `--verbose` and `--json` flags.
///
/// When combined with `--json`, verbose output is suppressed to keep JSON clean.
pub fn create_root_command() -> clap::Command {
    clap::Command::new("driveman")
        .about("Manage your cloud drive from the terminal")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            clap::Arg::new("json")
                .long("json")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Output in JSON format"),
        )
}

/// Returns whether verbose mode is active based on parsed matches.
pub fn is_verbose(matches: &clap::ArgMatches) -> bool {
    let verbose = matches.get_flag("verbose");
    let json = matches.get_flag("json");
    verbose && !json
}

/// Whether `--json` was given, looked up on a subcommand's matches.
pub fn wants_json(matches: &clap::ArgMatches) -> bool {
    matches
        .try_get_one::<bool>("json")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_command_flags() {
        let matches = create_root_command()
            .try_get_matches_from(["driveman", "--verbose", "--json"])
            .unwrap();
        assert!(matches.get_flag("verbose"));
        assert!(matches.get_flag("json"));
    }

    #[test]
    fn test_verbose_suppressed_with_json() {
        let matches = create_root_command()
            .try_get_matches_from(["driveman", "-v", "--json"])
            .unwrap();
        assert!(!is_verbose(&matches));
    }

    #[test]
    fn test_short_verbose_flag() {
        let matches = create_root_command()
            .try_get_matches_from(["driveman", "-v"])
            .unwrap();
        assert!(is_verbose(&matches));
    }

    #[test]
    fn test_no_flags_not_verbose() {
        let matches = create_root_command()
            .try_get_matches_from(["driveman"])
            .unwrap();
        assert!(!is_verbose(&matches));
        assert!(!wants_json(&matches));
    }

    #[test]
    fn test_json_flag_reaches_subcommand() {
        let matches = create_root_command()
            .subcommand(clap::Command::new("ls"))
            .try_get_matches_from(["driveman", "ls", "--json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(wants_json(sub));
    }

    #[test]
    fn test_wants_json_on_unrelated_matches() {
        let matches = clap::Command::new("x")
            .try_get_matches_from(["x"])
            .unwrap();
        assert!(!wants_json(&matches));
    }
}
