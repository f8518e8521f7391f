//! `logsift dissect` command handler
//!
//! Reads lines from a file or stdin, dissects them in batches with one rule
//! table and writes one JSON object per event to stdout.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use logsift_core::config::LogsiftConfig;
use logsift_core::event::Metadata;
use logsift_core::types::DissectStatus;
use logsift_engine::{DissectEngine, DissectOutcome, DissectPipeline, EngineConfig};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::DissectArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Metadata field recording the input file.
const FIELD_FILE_PATH: &str = "log.file.path";

/// Execute the `dissect` command.
pub async fn execute(
    args: DissectArgs,
    config: &LogsiftConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut engine_config = EngineConfig::from_core(&config.engine)?;
    if !args.rules.is_empty() {
        engine_config.rule_paths = args.rules.clone();
    }
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            return Err(CliError::Config(
                "--batch-size must be greater than 0".to_owned(),
            ));
        }
        engine_config.batch_size = batch_size;
    }
    let batch_size = engine_config.batch_size;

    let engine = DissectEngine::load(engine_config).await?;
    let pipeline = select_pipeline(&engine, args.table.as_deref())?;

    let mut metadata = parse_metadata(&args.meta)?;
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if args.reads_stdin() {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let path = args.input.as_deref().unwrap_or(Path::new("-"));
        metadata.insert(FIELD_FILE_PATH, path.display().to_string());
        let file = tokio::fs::File::open(path).await?;
        Box::new(BufReader::new(file))
    };

    info!(
        table = pipeline.table().name.as_str(),
        batch_size,
        stdin = args.reads_stdin(),
        "dissecting input"
    );

    let options = EmitOptions {
        with_status: args.with_status,
        drop_unmatched: args.drop_unmatched,
    };
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let summary = run(reader, pipeline, Arc::new(metadata), batch_size, options, &mut out).await?;
    out.flush()?;

    info!(
        lines = summary.lines,
        matched = summary.matched,
        header_only = summary.header_only,
        unmatched = summary.unmatched,
        skipped = summary.skipped,
        "dissection finished"
    );
    if args.summary {
        writer.render_stderr(&summary)?;
    }

    Ok(())
}

/// How each outcome is written.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EmitOptions {
    pub with_status: bool,
    pub drop_unmatched: bool,
}

/// Read lines in batches, dissect each batch on the blocking pool and
/// write the events as JSON lines.
pub(crate) async fn run<R>(
    mut reader: R,
    pipeline: Arc<DissectPipeline>,
    metadata: Arc<Metadata>,
    batch_size: usize,
    options: EmitOptions,
    out: &mut dyn Write,
) -> Result<DissectSummary, CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = DissectSummary {
        table: pipeline.table().name.clone(),
        ..DissectSummary::default()
    };
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);
    let mut buf = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let line = decode_line(&buf, line_no);
        if line.is_empty() {
            continue;
        }
        batch.push(line);

        if batch.len() >= batch_size {
            let lines = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            flush_batch(lines, &pipeline, &metadata, options, &mut summary, out).await?;
        }
    }
    if !batch.is_empty() {
        flush_batch(batch, &pipeline, &metadata, options, &mut summary, out).await?;
    }

    Ok(summary)
}

/// Strip the line terminator; invalid UTF-8 is replaced, not rejected.
fn decode_line(buf: &[u8], line_no: u64) -> String {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let bytes = &buf[..end];
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(e) => {
            warn!(line = line_no, error = %e, "input line is not valid UTF-8, replacing");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

async fn flush_batch(
    lines: Vec<String>,
    pipeline: &Arc<DissectPipeline>,
    metadata: &Arc<Metadata>,
    options: EmitOptions,
    summary: &mut DissectSummary,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let read = lines.len();
    let worker = Arc::clone(pipeline);
    let meta = Arc::clone(metadata);
    let outcomes = tokio::task::spawn_blocking(move || worker.dissect_batch(&lines, &meta))
        .await
        .map_err(|e| CliError::Command(format!("dissect worker failed: {e}")))?;

    debug!(read, dissected = outcomes.len(), "batch dissected");
    summary.lines += read as u64;
    summary.skipped += (read - outcomes.len()) as u64;

    for outcome in outcomes {
        summary.record(outcome.status);
        if options.drop_unmatched && outcome.status == DissectStatus::Unmatched {
            continue;
        }
        serde_json::to_writer(&mut *out, &outcome_json(&outcome, options.with_status))?;
        writeln!(out)?;
    }
    Ok(())
}

fn outcome_json(outcome: &DissectOutcome, with_status: bool) -> serde_json::Value {
    if !with_status {
        return outcome.event.to_json();
    }
    json!({
        "status": outcome.status,
        "stage": outcome.stage,
        "header_rule": outcome.header_rule,
        "message_rule": outcome.message_rule,
        "event": outcome.event.to_json(),
    })
}

/// `--table` wins; otherwise exactly one table must be loaded.
fn select_pipeline(
    engine: &DissectEngine,
    table: Option<&str>,
) -> Result<Arc<DissectPipeline>, CliError> {
    if let Some(name) = table {
        return Ok(engine.pipeline(name)?);
    }
    if let Some(pipeline) = engine.sole_pipeline() {
        return Ok(pipeline);
    }
    if engine.is_empty() {
        return Err(CliError::Rule("no rule tables loaded".to_owned()));
    }
    Err(CliError::Command(format!(
        "{} rule tables loaded; choose one with --table ({})",
        engine.len(),
        engine.table_names().collect::<Vec<_>>().join(", ")
    )))
}

/// Parse repeated `key=value` pairs. Values stay strings.
fn parse_metadata(pairs: &[String]) -> Result<Metadata, CliError> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| {
                CliError::Command(format!("invalid --meta '{pair}': expected KEY=VALUE"))
            })?;
        metadata.insert(key.trim(), value);
    }
    Ok(metadata)
}

/// Per-run status counts.
#[derive(Debug, Default, Serialize)]
pub struct DissectSummary {
    pub table: String,
    pub lines: u64,
    pub matched: u64,
    pub header_only: u64,
    pub unmatched: u64,
    /// Lines rejected before dissection (oversize)
    pub skipped: u64,
}

impl DissectSummary {
    fn record(&mut self, status: DissectStatus) {
        match status {
            DissectStatus::Matched => self.matched += 1,
            DissectStatus::HeaderOnly => self.header_only += 1,
            DissectStatus::Unmatched => self.unmatched += 1,
        }
    }
}

impl Render for DissectSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Dissect Summary: {}", self.table.bold())?;
        writeln!(w, "  Lines:       {}", self.lines)?;
        writeln!(w, "  Matched:     {}", self.matched.to_string().green())?;
        writeln!(w, "  Header only: {}", self.header_only.to_string().yellow())?;
        writeln!(w, "  Unmatched:   {}", self.unmatched.to_string().red())?;
        if self.skipped > 0 {
            writeln!(w, "  Skipped:     {}", self.skipped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_engine::{EngineConfigBuilder, RuleLoader};

    const TABLE: &str = r#"
name: fw
strip_priority: true
headers: { kind: rule, id: HDR, pattern: "%{hostname} %{messageid}: %{payload}" }
dispatch:
  messages:
    "LOGIN": { kind: rule, id: MSG1, pattern: "user=%{username} from=%{saddr}" }
emit:
  mappings:
    username: { kind: string, to: [ { field: user.name } ] }
"#;

    fn pipeline(max_line_bytes: usize) -> Arc<DissectPipeline> {
        let table = RuleLoader::parse_yaml(TABLE, "fw.yml").expect("table compiles");
        let config = EngineConfigBuilder::new()
            .max_line_bytes(max_line_bytes)
            .build()
            .expect("config");
        let engine = DissectEngine::from_tables(config, vec![table]).expect("engine");
        engine.sole_pipeline().expect("one table")
    }

    async fn dissect(input: &str, batch_size: usize, options: EmitOptions) -> (DissectSummary, Vec<serde_json::Value>) {
        let mut out = Vec::new();
        let summary = run(
            input.as_bytes(),
            pipeline(64),
            Arc::new(Metadata::new().with("observer.type", "firewall")),
            batch_size,
            options,
            &mut out,
        )
        .await
        .expect("run succeeds");
        let events = String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("each line is json"))
            .collect();
        (summary, events)
    }

    #[tokio::test]
    async fn test_run_writes_one_json_line_per_event() {
        let input = "<13>fw1 LOGIN: user=alice from=10.0.0.1\n\
                     fw1 REBOOT: now\r\n\
                     \n\
                     garbage\n";
        let (summary, events) = dissect(input, 2, EmitOptions::default()).await;

        assert_eq!(summary.lines, 3, "blank lines are not counted");
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.header_only, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0]["user"]["name"], "alice");
        assert_eq!(events[0]["observer"]["type"], "firewall");
        assert_eq!(events[1]["messageid"], "REBOOT");
        assert_eq!(events[1]["payload"], "now", "header-only keeps the payload");
    }

    #[tokio::test]
    async fn test_run_with_status_and_drop_unmatched() {
        let input = "fw1 LOGIN: user=bob from=10.0.0.2\ngarbage\n";
        let options = EmitOptions {
            with_status: true,
            drop_unmatched: true,
        };
        let (summary, events) = dissect(input, 10, options).await;

        assert_eq!(summary.unmatched, 1);
        assert_eq!(events.len(), 1, "unmatched line is dropped");
        assert_eq!(events[0]["status"], "matched");
        assert_eq!(events[0]["stage"], "emit");
        assert_eq!(events[0]["header_rule"], "HDR");
        assert_eq!(events[0]["message_rule"], "MSG1");
        assert_eq!(events[0]["event"]["user"]["name"], "bob");
    }

    #[tokio::test]
    async fn test_run_counts_oversize_lines_as_skipped() {
        let long = format!("fw1 LOGIN: user={} from=1.1.1.1\n", "x".repeat(100));
        let input = format!("fw1 LOGIN: user=a from=1.1.1.1\n{long}");
        let (summary, events) = dissect(&input, 10, EmitOptions::default()).await;
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_decode_line_strips_terminators_and_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"abc\r\n", 1), "abc");
        assert_eq!(decode_line(b"abc", 1), "abc");
        assert_eq!(decode_line(b"a\xffb\n", 1), "a\u{fffd}b");
    }

    #[test]
    fn test_parse_metadata_pairs() {
        let meta = parse_metadata(&["host.name=fw1".to_owned(), "tag=a=b".to_owned()])
            .expect("valid pairs");
        let fields: Vec<_> = meta.iter().map(|(k, v)| (k.to_owned(), v.to_string())).collect();
        assert!(fields.contains(&("host.name".to_owned(), "fw1".to_owned())));
        assert!(fields.contains(&("tag".to_owned(), "a=b".to_owned())));

        assert!(parse_metadata(&["novalue".to_owned()]).is_err());
        assert!(parse_metadata(&["=value".to_owned()]).is_err());
    }

    #[test]
    fn test_select_pipeline_requires_table_when_ambiguous() {
        let a = RuleLoader::parse_yaml("name: a\ninput: json\n", "a").expect("a");
        let b = RuleLoader::parse_yaml("name: b\ninput: json\n", "b").expect("b");
        let engine = DissectEngine::from_tables(EngineConfig::default(), vec![a, b]).expect("engine");

        match select_pipeline(&engine, None) {
            Err(CliError::Command(msg)) => assert!(msg.contains("--table (a, b)")),
            _ => panic!("expected Command error"),
        }
        assert_eq!(
            select_pipeline(&engine, Some("b")).expect("b exists").table().name,
            "b"
        );
        assert!(matches!(
            select_pipeline(&engine, Some("zzz")),
            Err(CliError::Dissect(_))
        ));
    }

    #[test]
    fn test_summary_render_text() {
        let summary = DissectSummary {
            table: "fw".to_owned(),
            lines: 3,
            matched: 1,
            header_only: 1,
            unmatched: 1,
            skipped: 0,
        };
        let mut buffer = Vec::new();
        summary.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("Dissect Summary"));
        assert!(!output.contains("Skipped"));
    }
}
