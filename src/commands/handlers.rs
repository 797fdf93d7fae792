use crate::commands::parser::{Command, USAGE};
use crate::error::StoreError;
use crate::storage::{LocalStorage, StoredObject};

use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::time::UNIX_EPOCH;

// Run a single command against the store, writing its output to `out`
pub fn execute(
    storage: &LocalStorage,
    command: Command,
    out: &mut dyn Write,
) -> Result<(), StoreError> {
    match command {
        Command::Put { key, source } => handle_cmd_put(storage, &key, &source, out),
        Command::Get(key) => handle_cmd_get(storage, &key, out),
        Command::List(prefix) => handle_cmd_list(storage, &prefix, out),
        Command::Delete(key) => {
            storage.delete(&key)?;
            writeln!(out, "deleted {key}")?;
            Ok(())
        }
        Command::Copy { from, to } => {
            let object = storage.copy_object(&from, &to)?;
            writeln!(out, "copied {from} -> {}", object.path)?;
            Ok(())
        }
        Command::Move { from, to } => {
            let object = storage.move_object(&from, &to)?;
            writeln!(out, "moved {from} -> {}", object.path)?;
            Ok(())
        }
        Command::Stat(key) => {
            let object = storage.stat(&key)?;
            writeln!(out, "{}", format_object(&object))?;
            Ok(())
        }
        Command::Help => {
            out.write_all(USAGE.as_bytes())?;
            Ok(())
        }
        Command::Unknown(cmd) => Err(StoreError::Usage(format!("unrecognised command: {cmd}"))),
    }
}

// Command handler for PUT
fn handle_cmd_put(
    storage: &LocalStorage,
    key: &str,
    source: &std::path::Path,
    out: &mut dyn Write,
) -> Result<(), StoreError> {
    let mut file = File::open(source)?;
    let object = storage.put_seekable(key, &mut file)?;
    info!("Uploaded {} as {}", source.display(), object.path);
    writeln!(
        out,
        "stored {} ({} bytes)",
        object.path,
        object.size.unwrap_or(0)
    )?;
    Ok(())
}

// Command handler for GET
fn handle_cmd_get(storage: &LocalStorage, key: &str, out: &mut dyn Write) -> Result<(), StoreError> {
    let mut stream = storage.get_stream(key)?;
    io::copy(&mut stream, out)?;
    out.flush()?;
    Ok(())
}

// Command handler for LIST
fn handle_cmd_list(
    storage: &LocalStorage,
    prefix: &str,
    out: &mut dyn Write,
) -> Result<(), StoreError> {
    let objects = storage.list(prefix)?;
    for object in &objects {
        writeln!(out, "{}", format_object(object))?;
    }
    Ok(())
}

// Format: "path\tsize\tmtime" with mtime in unix seconds
fn format_object(object: &StoredObject) -> String {
    let timestamp = object
        .last_modified
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|dur| dur.as_secs())
        .unwrap_or(0);

    format!("{}\t{}\t{}", object.path, object.size.unwrap_or(0), timestamp)
}
