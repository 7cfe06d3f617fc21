use std::sync::Arc;

use driveman_lib::cli::{create_root_command, is_verbose, CommandRegistry};
use driveman_lib::commands::{dispatch_command, register_commands, ServiceRegistry};
use driveman_lib::config::manager::DynamicConfigManager;
use driveman_lib::config::simplified::SimplifiedConfig;
use driveman_lib::errors::{handle_command_error, handle_fatal};
use driveman_lib::http_client::HttpClient;
use driveman_lib::signal::SignalHandler;

#[tokio::main]
async fn main() {
    // Step 1: Resolve paths (singleton, from env vars)
    let paths = SimplifiedConfig::get();

    // Step 2: Build the command tree and parse arguments
    let mut registry = CommandRegistry::new(create_root_command());
    if let Err(e) = register_commands(&mut registry) {
        handle_fatal(e);
    }
    let matches = registry.root_command().get_matches();

    // Step 3: Logger, honouring -v unless --json
    let verbose = is_verbose(&matches);
    driveman_lib::logger::init(verbose);
    driveman_lib::logger::set_verbose(verbose);

    // Step 4: Ctrl-C / SIGTERM cancel in-flight transfers
    let signal_handler = SignalHandler::new();
    let shutdown = signal_handler.token();
    tokio::spawn(async move {
        signal_handler.listen().await;
    });

    // Step 5: Dynamic config, shared HTTP client, services
    let config_manager = match DynamicConfigManager::initialize(None).await {
        Ok(mgr) => Arc::new(mgr),
        Err(e) => handle_fatal(e),
    };
    let config = config_manager.get_config().await;
    let http_client = match HttpClient::new(&config) {
        Ok(client) => client,
        Err(e) => handle_fatal(e),
    };
    let services = ServiceRegistry::new(
        config_manager,
        http_client,
        paths.session_db.clone(),
        shutdown,
    );
    services.register_config_listeners().await;

    // Step 6: Dispatch
    let Some((name, sub_matches)) = matches.subcommand() else {
        println!("driveman {}", env!("CARGO_PKG_VERSION"));
        println!("Usage: driveman [--verbose] [--json] <COMMAND>");
        print!("{}", registry.render_listing());
        println!("\nRun `driveman <COMMAND> --help` for details.");
        return;
    };

    let Some(meta) = registry.get(name) else {
        handle_fatal(driveman_lib::errors::DrivemanError::Command(format!(
            "unknown command: {name}"
        )));
    };

    tracing::debug!(command = name, "executing command");
    if let Err(e) = dispatch_command(meta, sub_matches, &services).await {
        handle_command_error(&e);
        std::process::exit(1);
    }
}
