//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default configuration file, used only when it exists.
pub const DEFAULT_CONFIG_PATH: &str = "logsift.toml";

/// logsift -- pattern-based log dissection.
///
/// Use `logsift <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logsift", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logsift.toml configuration file.
    ///
    /// Without this flag `./logsift.toml` is read if present, otherwise defaults apply.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format for reports.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dissect log lines from a file or stdin into JSON lines.
    Dissect(DissectArgs),

    /// Inspect and validate rule tables.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- dissect ----

/// Dissect every line of the input with one rule table.
#[derive(Args, Debug)]
pub struct DissectArgs {
    /// Input file (`-` or omitted: stdin).
    pub input: Option<PathBuf>,

    /// Rule table name. Required when more than one table is loaded.
    #[arg(short, long)]
    pub table: Option<String>,

    /// Rule table files or directories (overrides `engine.rule_paths`).
    #[arg(short, long = "rules")]
    pub rules: Vec<String>,

    /// Transport metadata merged into every event (`key=value`, repeatable).
    #[arg(short, long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Lines per batch (overrides `engine.batch_size`).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Wrap each event with its dissection status and matched rule IDs.
    #[arg(long)]
    pub with_status: bool,

    /// Do not emit events whose header did not match.
    #[arg(long)]
    pub drop_unmatched: bool,

    /// Print a status summary to stderr when done.
    #[arg(long)]
    pub summary: bool,
}

impl DissectArgs {
    /// `true` when input should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        match &self.input {
            None => true,
            Some(path) => path.as_os_str() == "-",
        }
    }
}

// ---- rules ----

/// Inspect and validate rule tables.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the rule tables found in `engine.rule_paths`.
    List,
    /// Compile rule table files and report every error.
    Validate {
        /// Files or directories to check (default: `engine.rule_paths`).
        paths: Vec<PathBuf>,
    },
}

// ---- config ----

/// Manage logsift configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, engine).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_dissect_defaults() {
        let cli = Cli::try_parse_from(["logsift", "dissect"]).expect("parse succeeded");
        assert!(cli.config.is_none(), "config should default to None");
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Commands::Dissect(args) => {
                assert!(args.reads_stdin(), "no input means stdin");
                assert!(args.table.is_none());
                assert!(args.rules.is_empty());
                assert!(!args.with_status);
                assert!(!args.drop_unmatched);
            }
            _ => panic!("expected Dissect command"),
        }
    }

    #[test]
    fn test_cli_parse_dissect_full() {
        let cli = Cli::try_parse_from([
            "logsift",
            "dissect",
            "/var/log/fw.log",
            "--table",
            "junos",
            "--rules",
            "rules/a.yml",
            "--rules",
            "rules/extra",
            "--meta",
            "host.name=fw1",
            "--meta",
            "observer.vendor=Juniper",
            "--batch-size",
            "256",
            "--with-status",
            "--summary",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Dissect(args) => {
                assert!(!args.reads_stdin());
                assert_eq!(args.table.as_deref(), Some("junos"));
                assert_eq!(args.rules, ["rules/a.yml", "rules/extra"]);
                assert_eq!(args.meta.len(), 2);
                assert_eq!(args.batch_size, Some(256));
                assert!(args.with_status);
                assert!(args.summary);
            }
            _ => panic!("expected Dissect command"),
        }
    }

    #[test]
    fn test_cli_parse_dissect_dash_reads_stdin() {
        let cli = Cli::try_parse_from(["logsift", "dissect", "-"]).expect("parse succeeded");
        match cli.command {
            Commands::Dissect(args) => assert!(args.reads_stdin()),
            _ => panic!("expected Dissect command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_validate_paths() {
        let cli = Cli::try_parse_from(["logsift", "rules", "validate", "a.yml", "dir"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Validate { paths },
            }) => {
                assert_eq!(paths, [PathBuf::from("a.yml"), PathBuf::from("dir")]);
            }
            _ => panic!("expected Rules Validate command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_list() {
        let cli = Cli::try_parse_from(["logsift", "rules", "list"]).expect("parse succeeded");
        assert!(matches!(
            cli.command,
            Commands::Rules(RulesArgs {
                action: RulesAction::List
            })
        ));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["logsift", "config", "show", "--section", "engine"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("engine")),
            _ => panic!("expected Config Show command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "logsift",
            "config",
            "validate",
            "--config",
            "/etc/logsift.toml",
            "--output",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/logsift.toml")));
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_rejects_unknown_output_format() {
        let result = Cli::try_parse_from(["logsift", "--output", "yaml", "rules", "list"]);
        assert!(result.is_err(), "yaml is not a supported output format");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["logsift"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
