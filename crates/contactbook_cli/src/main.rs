//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `contactbook_core` linkage and that migrations apply cleanly.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `contactbook_cli [DB_PATH]` (in-memory when omitted).

use contactbook_core::db::migrations::current_version;
use contactbook_core::db::{open_db, open_db_in_memory};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("contactbook_core version={}", contactbook_core::core_version());
    println!("contactbook_core schema={}", contactbook_core::schema_version());

    let opened = match std::env::args().nth(1) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("db_open status=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    match current_version(&conn) {
        Ok(version) => {
            println!("db_open status=ok user_version={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("db_open status=error error={err}");
            ExitCode::FAILURE
        }
    }
}
