//! `logsift rules` command handler

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use logsift_core::config::LogsiftConfig;
use logsift_engine::rule::InputFormat;
use logsift_engine::{RuleLoader, RuleTable};
use serde::Serialize;
use tracing::info;

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &LogsiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => execute_list(config, writer).await,
        RulesAction::Validate { paths } => {
            let paths = if paths.is_empty() {
                config.engine.rule_paths.iter().map(PathBuf::from).collect()
            } else {
                paths
            };
            execute_validate(&paths, writer).await
        }
    }
}

async fn execute_list(config: &LogsiftConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(paths = ?config.engine.rule_paths, "loading rule tables");

    let tables = RuleLoader::load_paths(&config.engine.rule_paths).await?;
    let report = TableListReport {
        total: tables.len(),
        tables: tables.iter().map(TableEntry::from_table).collect(),
    };

    writer.render(&report)?;
    Ok(())
}

/// Compile every rule file under `paths` independently and collect all errors.
async fn execute_validate(paths: &[PathBuf], writer: &OutputWriter) -> Result<(), CliError> {
    let report = validate_paths(paths).await?;
    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Rule(format!(
            "{} invalid rule file(s)",
            report.invalid
        )));
    }

    Ok(())
}

pub(crate) async fn validate_paths(paths: &[PathBuf]) -> Result<RuleValidationReport, CliError> {
    let mut files = Vec::new();
    for path in paths {
        info!(path = %path.display(), "validating rule tables");
        files.extend(collect_rule_files(path).await?);
    }

    let mut report = RuleValidationReport {
        paths: paths.iter().map(|p| p.display().to_string()).collect(),
        total_files: files.len(),
        valid: 0,
        invalid: 0,
        tables: Vec::new(),
        errors: Vec::new(),
    };
    let mut seen: HashMap<String, String> = HashMap::new();

    for file in files {
        let file_name = file.display().to_string();
        match RuleLoader::load_file(&file).await {
            Ok(table) => {
                if let Some(first) = seen.get(&table.name) {
                    report.invalid += 1;
                    report.errors.push(RuleFileError {
                        file: file_name,
                        error: format!(
                            "duplicate table name '{}' (first defined in {first})",
                            table.name
                        ),
                    });
                    continue;
                }
                seen.insert(table.name.clone(), file_name);
                report.valid += 1;
                report.tables.push(TableEntry::from_table(&table));
            }
            Err(e) => {
                report.invalid += 1;
                report.errors.push(RuleFileError {
                    file: file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// A directory expands to its `.yml`/`.yaml` files in name order.
async fn collect_rule_files(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        CliError::Rule(format!("cannot access {}: {e}", path.display()))
    })?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut entries = tokio::fs::read_dir(path).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let candidate = entry.path();
        if candidate
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Serialize)]
pub struct TableListReport {
    pub total: usize,
    pub tables: Vec<TableEntry>,
}

#[derive(Serialize)]
pub struct TableEntry {
    pub name: String,
    pub input: InputFormat,
    pub description: String,
    /// Compiled pattern count (shared patterns counted once)
    pub patterns: usize,
    /// Dispatch entries
    pub messages: usize,
}

impl TableEntry {
    fn from_table(table: &RuleTable) -> Self {
        Self {
            name: table.name.clone(),
            input: table.input,
            description: table.description.clone(),
            patterns: table.pattern_count,
            messages: table.dispatch.as_ref().map_or(0, |d| d.len()),
        }
    }
}

fn input_label(input: InputFormat) -> &'static str {
    match input {
        InputFormat::Text => "text",
        InputFormat::Json => "json",
    }
}

impl Render for TableListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Tables ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<6} {:>9} {:>9}  Description",
            "Name", "Input", "Patterns", "Messages"
        )?;
        writeln!(w, "{}", "-".repeat(80))?;

        for t in &self.tables {
            writeln!(
                w,
                "{:<24} {:<6} {:>9} {:>9}  {}",
                t.name,
                input_label(t.input),
                t.patterns,
                t.messages,
                t.description
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub paths: Vec<String>,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub tables: Vec<TableEntry>,
    pub errors: Vec<RuleFileError>,
}

#[derive(Serialize)]
pub struct RuleFileError {
    pub file: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.paths.join(", ").bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid",
            self.total_files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        for t in &self.tables {
            writeln!(
                w,
                "  {} {} ({} patterns, {} messages)",
                "ok".green(),
                t.name,
                t.patterns,
                t.messages
            )?;
        }

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file.red(), e.error)?;
            }
        }

        Ok(())
    }
}
