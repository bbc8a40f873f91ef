//! Command-line argument model.

use authorbook_core::config::DEFAULT_CONFIG_FILE;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Maintain author records and their audit trail.
#[derive(Parser, Debug)]
#[command(name = "authorbook", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file
    #[arg(long, global = true, env = "AUTHORBOOK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// SQLite database file; overrides `[database] path`
    #[arg(long, global = true, env = "AUTHORBOOK_DB")]
    pub db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List authors by first name
    List,

    /// Show one author
    Show { id: i64 },

    /// Add a new author
    Add(AddArgs),

    /// Change fields of an existing author
    Update(UpdateArgs),

    /// Delete an author (audit history is kept)
    Delete { id: i64 },

    /// Show the audit trail of an author
    Audit { id: i64 },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    /// Date of birth, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub dob: NaiveDate,
    /// male, female or unknown
    #[arg(long, default_value = "unknown")]
    pub gender: String,
    #[arg(long)]
    pub website: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: i64,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    /// Date of birth, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub dob: Option<NaiveDate>,
    #[arg(long)]
    pub gender: Option<String>,
    #[arg(long, conflicts_with = "clear_website")]
    pub website: Option<String>,
    /// Remove the stored website
    #[arg(long)]
    pub clear_website: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD, got `{value}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, DEFAULT_CONFIG_FILE};
    use std::path::PathBuf;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_defaults_to_core_config_file_name() {
        let cli = Cli::try_parse_from(["authorbook", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn update_rejects_website_with_clear_website() {
        let result = Cli::try_parse_from([
            "authorbook",
            "update",
            "1",
            "--website",
            "https://example.org",
            "--clear-website",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn add_parses_date_of_birth() {
        let cli = Cli::try_parse_from([
            "authorbook",
            "add",
            "--first-name",
            "Mary",
            "--last-name",
            "Shelley",
            "--dob",
            "1797-08-30",
        ])
        .unwrap();
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.dob.to_string(), "1797-08-30");
                assert_eq!(args.gender, "unknown");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
