//! `authorbook` command-line entry point.
//!
//! # Responsibility
//! - Load configuration, open the database, and dispatch one command.
//! - Map failures to stable exit codes.

mod cli;
mod commands;

use authorbook_core::{AppConfig, AuthorService, SqliteAuthorGateway};
use clap::Parser;
use cli::Cli;
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Cli::parse();

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };
    if let Some(db) = &args.db {
        config.database.path = Some(db.clone());
    }
    if let Err(err) = config.init_logging() {
        eprintln!("warning: logging disabled: {err}");
    }

    let gateway = match config
        .open_database()
        .map_err(Into::into)
        .and_then(SqliteAuthorGateway::try_new)
    {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={err}");
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };
    let service = AuthorService::new(gateway);

    match commands::execute(&service, &args.command, args.json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
