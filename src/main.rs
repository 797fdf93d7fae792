//! RAX object store - Entry Point
//!
//! Exposes a local directory tree as a flat object namespace.

use log::info;
use std::io::{self, Write};

use rax_object_store::commands::{Command, USAGE, execute, parse_args};
use rax_object_store::error::StoreError;
use rax_object_store::error::handlers::{error_to_exit_code, handle_error};
use rax_object_store::utils::logging::setup_logging;
use rax_object_store::{LocalStorage, StorageConfig};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    setup_logging();

    let command = parse_args(std::env::args().skip(1));
    if let Err(e) = run(command).await {
        handle_error(&e);
        std::process::exit(error_to_exit_code(&e));
    }
}

async fn run(command: Command) -> Result<(), StoreError> {
    match command {
        Command::Help => {
            io::stdout().write_all(USAGE.as_bytes())?;
            return Ok(());
        }
        Command::Unknown(cmd) => {
            return Err(StoreError::Usage(format!(
                "unrecognised command: {cmd}\n{USAGE}"
            )));
        }
        _ => {}
    }

    let config = StorageConfig::load()?;
    let storage = LocalStorage::from_config(&config)?;
    info!("Running {:?}", command);

    // Storage calls block on disk I/O; keep them off the async workers.
    tokio::task::spawn_blocking(move || {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        execute(&storage, command, &mut out)
    })
    .await
    .map_err(|e| StoreError::Io(io::Error::other(e)))?
}
