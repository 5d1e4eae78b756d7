use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vrijekas_core::VariableCategory;
use vrijekas_core::db::DbConfig;

/// Income tax statement calculator for Dutch freelancers.
///
/// Inputs live in a local database; `compute` derives the statement from
/// them and stores the result.
#[derive(Debug, Parser)]
#[command(name = "vrijekas", version, about)]
pub struct Cli {
    /// Storage backend to use.
    #[arg(long, global = true, default_value = "sqlite")]
    pub backend: String,

    /// Database location. For SQLite a file path or `:memory:`.
    #[arg(long, global = true, default_value = "vrijekas.db")]
    pub db: String,

    /// Log filter, e.g. `debug` or `vrijekas_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also append log records to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Hide log output on the console.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.backend, &self.db)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List variables.
    Show(ShowArgs),

    /// Print one variable.
    Get {
        key: String,
    },

    /// Update input variables, e.g. `set hrs_home=620 rate_home=55`.
    Set {
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },

    /// Replace a derived value with a fixed amount.
    Override {
        key: String,
        value: String,
    },

    /// Let the statement derive an overridden value again.
    ClearOverride {
        key: String,
    },

    /// Restore every statement input to its default and drop any override.
    Reset,

    /// Import input variables from a CSV file with a `key,value` header.
    Import {
        file: PathBuf,
    },

    /// Compute and store the statement from the current inputs.
    Compute,

    /// Print the last stored statement.
    Statement,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ShowArgs {
    /// Only variables in this category.
    #[arg(long, value_parser = parse_category)]
    pub category: Option<VariableCategory>,

    /// Only user inputs.
    #[arg(long, conflicts_with = "derived")]
    pub editable: bool,

    /// Only derived values.
    #[arg(long)]
    pub derived: bool,
}

fn parse_category(s: &str) -> Result<VariableCategory, String> {
    VariableCategory::parse(&s.to_lowercase()).ok_or_else(|| {
        let names: Vec<&str> = VariableCategory::all().iter().map(|c| c.as_str()).collect();
        format!("unknown category '{s}'; expected one of: {}", names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vrijekas").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn defaults_point_at_local_sqlite_file() {
        let cli = parse(&["compute"]);

        assert_eq!(
            cli.db_config(),
            DbConfig {
                backend: "sqlite".to_string(),
                connection_string: "vrijekas.db".to_string(),
            }
        );
        assert!(!cli.quiet);
        assert_eq!(cli.command, Command::Compute);
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = parse(&["statement", "--db", ":memory:", "--log-level", "debug", "-q"]);

        assert_eq!(cli.db, ":memory:");
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.quiet);
    }

    #[test]
    fn show_parses_filters() {
        let cli = parse(&["show", "--category", "Car", "--editable"]);

        assert_eq!(
            cli.command,
            Command::Show(ShowArgs {
                category: Some(VariableCategory::Car),
                editable: true,
                derived: false,
            })
        );
    }

    #[test]
    fn show_rejects_conflicting_and_unknown_filters() {
        assert!(Cli::try_parse_from(["vrijekas", "show", "--editable", "--derived"]).is_err());
        assert!(Cli::try_parse_from(["vrijekas", "show", "--category", "boat"]).is_err());
    }

    #[test]
    fn set_requires_assignments() {
        assert!(Cli::try_parse_from(["vrijekas", "set"]).is_err());

        let cli = parse(&["set", "hrs_home=620", "rate_home=55"]);
        assert_eq!(
            cli.command,
            Command::Set {
                assignments: vec!["hrs_home=620".to_string(), "rate_home=55".to_string()],
            }
        );
    }

    #[test]
    fn reset_takes_no_arguments() {
        assert_eq!(parse(&["reset"]).command, Command::Reset);
        assert!(Cli::try_parse_from(["vrijekas", "reset", "hrs_home"]).is_err());
    }

    #[test]
    fn override_takes_key_and_value() {
        let cli = parse(&["override", "mkb_vrijstelling", "7,620"]);

        assert_eq!(
            cli.command,
            Command::Override {
                key: "mkb_vrijstelling".to_string(),
                value: "7,620".to_string(),
            }
        );
    }
}
