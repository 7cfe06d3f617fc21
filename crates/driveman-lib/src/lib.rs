// driveman-lib: session store, drive gateway and CLI for the driveman binary

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod drive;
pub mod errors;
pub mod format;
pub mod http_client;
pub mod logger;
pub mod output;
pub mod session;
pub mod signal;
pub mod text;
pub mod tui;
