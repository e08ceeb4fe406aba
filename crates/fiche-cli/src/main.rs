mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use fiche_core::config::schema::OriginLevel;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fiche",
    version,
    about = "Inspection report engine for waste-tracking manifests"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the records come from and how the engine is tuned.
#[derive(clap::Args)]
pub struct InputArgs {
    /// JSON bundle, or XLSX export with one sheet per category
    input_file: PathBuf,

    /// JSON file with the establishment and its authorizations (required for XLSX input)
    #[arg(short, long, value_name = "FILE")]
    establishment: Option<PathBuf>,

    /// Engine config file layered over the builtin defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Weight above which a value is taken as kilograms
    #[arg(long, value_name = "TONNES")]
    kg_threshold: Option<String>,

    /// Number of origins listed before the rest is grouped
    #[arg(long, value_name = "N")]
    top_n: Option<usize>,

    /// Origin granularity
    #[arg(long, value_enum, ignore_case = true)]
    level: Option<LevelArg>,

    /// Run date (YYYY-MM-DD or RFC 3339), defaults to now
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    #[value(alias = "departement")]
    Department,
    Region,
}

impl From<LevelArg> for OriginLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Department => OriginLevel::Department,
            LevelArg::Region => OriginLevel::Region,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the inspection report of one establishment
    Report {
        #[command(flatten)]
        input: InputArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the JSON report to a file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Export the records set aside by the quarantine, as JSON
    Quarantine {
        #[command(flatten)]
        input: InputArgs,

        /// Write to a file instead of stdout
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Inspect engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the builtin reference tables
    Reference {
        #[command(subcommand)]
        action: ReferenceAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config (builtin defaults, or a file layered over them)
    Show {
        /// Config file
        file: Option<PathBuf>,
    },
    /// Validate a config file
    Validate {
        /// Config file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ReferenceAction {
    /// Departments with their region
    Departments,
    /// Processing operations, rubriques and consumption policies
    Rubriques,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match cli.command {
        Commands::Report { input, output, out } => commands::report::run(&input, &output, out),
        Commands::Quarantine { input, out } => commands::quarantine::run(&input, out),
        Commands::Config { action } => match action {
            ConfigAction::Show { file } => commands::config::show(file.as_deref()),
            ConfigAction::Validate { file } => commands::config::validate(&file),
        },
        Commands::Reference { action } => match action {
            ReferenceAction::Departments => commands::reference::departments(),
            ReferenceAction::Rubriques => commands::reference::rubriques(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_of(args: &[&str]) -> Option<LevelArg> {
        let mut argv = vec!["fiche", "report", "bundle.json"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Report { input, .. } => input.level,
            _ => panic!("expected the report command"),
        }
    }

    #[test]
    fn test_level_values() {
        assert_eq!(level_of(&[]), None);
        assert_eq!(level_of(&["--level", "region"]), Some(LevelArg::Region));
        assert_eq!(level_of(&["--level", "Departement"]), Some(LevelArg::Department));
        assert_eq!(OriginLevel::from(LevelArg::Region), OriginLevel::Region);
    }

    #[test]
    fn test_unknown_level_rejected_by_parser() {
        let err = Cli::try_parse_from(["fiche", "report", "bundle.json", "--level", "commune"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
