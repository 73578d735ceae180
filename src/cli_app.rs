//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{ColoredString, Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use audio_device_selection::core::config::Config;
use audio_device_selection::core::errors::{AdselError, ErrorClass};
use audio_device_selection::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use audio_device_selection::report::summary::RunSummary;
use audio_device_selection::report::transcript::{self, TranscriptFormat};
use audio_device_selection::scenario::corpus;
use audio_device_selection::scenario::format::Scenario;
use audio_device_selection::scenario::generate::{self as generator, GeneratorConfig};
use audio_device_selection::scenario::loader::{self, DiscoveryConfig};
use audio_device_selection::scenario::runner::{self, ScenarioOutcome, Verdict};
use audio_device_selection::sim::election::{self, Candidate};

/// Exit code for unparseable command lines.
pub const USAGE_EXIT_CODE: i32 = 3;

/// Audio device-selection simulator and scenario runner.
#[derive(Debug, Parser)]
#[command(
    name = "adsel",
    author,
    version,
    about = "Audio device-selection simulator and scenario runner",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run scenarios and report policy failures.
    Run(RunArgs),
    /// List discovered scenario ids.
    List(ListArgs),
    /// Trace the election step by step for one scenario.
    Explain(ExplainArgs),
    /// Generate random valid scenarios from a seed.
    Gen(GenArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct SourceArgs {
    /// Scenario root directory (built-in corpus when omitted).
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,
    /// Glob over scenario ids, e.g. `greendoc/*`.
    #[arg(long, value_name = "GLOB")]
    filter: Option<String>,
    /// Glob over file paths relative to the root.
    #[arg(long, value_name = "GLOB")]
    pattern: Option<String>,
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Write the full transcript to this file.
    #[arg(long, value_name = "PATH")]
    transcript: Option<PathBuf>,
    /// Transcript format.
    #[arg(long, value_name = "FORMAT", value_parser = parse_transcript_format)]
    format: Option<TranscriptFormat>,
    /// Worker threads.
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,
    /// Append JSONL activity records to this file.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ListArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Clone, Args)]
struct ExplainArgs {
    /// Scenario id, e.g. `greendoc/h4`.
    scenario: String,
    /// Scenario root directory (built-in corpus when omitted).
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct GenArgs {
    /// Output directory.
    #[arg(long, value_name = "DIR")]
    out: PathBuf,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 10)]
    count: usize,
    /// Devices per scenario.
    #[arg(long, default_value_t = 4)]
    devices: usize,
    /// Mutating steps per scenario.
    #[arg(long, default_value_t = 12)]
    steps: usize,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad arguments or configuration; nothing ran.
    #[error("{0}")]
    Config(String),
    /// The harness failed while running.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    ///
    /// Every CLI-level failure is an infrastructure or configuration error;
    /// codes 1 and 2 come only from scenario results.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Runtime(_) | Self::Json(_) | Self::Io(_) => 3,
        }
    }
}

impl From<AdselError> for CliError {
    fn from(err: AdselError) -> Self {
        match err.class() {
            ErrorClass::Configuration => Self::Config(err.to_string()),
            ErrorClass::Scenario | ErrorClass::Infrastructure => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands. `Ok` carries the process exit code.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_scenarios(cli, args),
        Command::List(args) => run_list(cli, args),
        Command::Explain(args) => run_explain(cli, args),
        Command::Gen(args) => run_gen(cli, args),
        Command::Config(args) => run_config(cli, args).map(|()| 0),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(0)
        }
    }
}

fn parse_transcript_format(raw: &str) -> Result<TranscriptFormat, String> {
    raw.parse()
}

// ---------------------------------------------------------------------------
// Scenario sources
// ---------------------------------------------------------------------------

struct Loaded {
    scenarios: Vec<Scenario>,
    /// Files that matched but never loaded, already turned into outcomes.
    failed: Vec<ScenarioOutcome>,
    origin: String,
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn load_scenarios(
    cli: &Cli,
    config: &Config,
    root: Option<&Path>,
    filter: Option<&str>,
) -> Result<Loaded, CliError> {
    let Some(root) = root.or(config.runner.root.as_deref()) else {
        let scenarios = loader::filter_by_id(corpus::load()?, filter)?;
        return Ok(Loaded {
            scenarios,
            failed: Vec::new(),
            origin: "built-in corpus".to_string(),
        });
    };

    if !root.is_dir() {
        return Err(CliError::Config(format!(
            "scenario root {} is not a directory",
            root.display()
        )));
    }

    let discovery = loader::discover(&DiscoveryConfig {
        root: root.to_path_buf(),
        pattern: config.runner.pattern.clone(),
        filter: filter.map(str::to_string),
        max_depth: config.runner.max_depth,
    })?;

    if cli.verbose {
        for skipped in &discovery.skipped {
            eprintln!("[ADSEL] skipped {} (no steps)", skipped.display());
        }
        eprintln!(
            "[ADSEL] discovered {} scenario(s), {} unreadable, under {}",
            discovery.scenarios.len(),
            discovery.failures.len(),
            root.display()
        );
    }

    Ok(Loaded {
        failed: discovery
            .failures
            .iter()
            .map(ScenarioOutcome::from_load_failure)
            .collect(),
        scenarios: discovery.scenarios,
        origin: root.display().to_string(),
    })
}

fn verdict_label(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Pass => verdict.label().green(),
        Verdict::Fail => verdict.label().red().bold(),
        Verdict::ScenarioError => verdict.label().yellow().bold(),
        Verdict::InfraError => verdict.label().magenta().bold(),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn run_scenarios(cli: &Cli, args: &RunArgs) -> Result<i32, CliError> {
    let started = Instant::now();
    let mut config = load_config(cli)?;
    if let Some(pattern) = &args.source.pattern {
        config.runner.pattern.clone_from(pattern);
    }
    if let Some(jobs) = args.jobs {
        config.runner.parallelism = jobs;
    }
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if let Some(path) = &args.transcript {
        config.report.transcript = Some(path.clone());
    }
    if let Some(path) = &args.log {
        config.logging.activity_log = Some(path.clone());
    }
    config.validate()?;

    let mut log = JsonlWriter::open(config.logging.activity_log.as_deref());
    let mut start = LogEntry::new(EventType::RunStart, Severity::Info);
    start.config_hash = Some(config.stable_hash()?);
    start.details = args.source.root.as_ref().map(|r| r.display().to_string());
    log.write_entry(&start);

    let loaded = load_scenarios(
        cli,
        &config,
        args.source.root.as_deref(),
        args.source.filter.as_deref(),
    )?;

    let mut outcomes = runner::run_all(&loaded.scenarios, config.runner.parallelism);
    outcomes.extend(loaded.failed);
    outcomes.sort_by(|a, b| a.id.cmp(&b.id));

    for outcome in &outcomes {
        log.write_entry(&LogEntry::for_outcome(outcome));
    }

    let summary = RunSummary::from_outcomes(&outcomes);
    let digest = transcript::digest(&outcomes);

    if let Some(path) = &config.report.transcript {
        let rendered = transcript::render(&outcomes, &summary, config.report.format)?;
        fs::write(path, rendered).map_err(|source| CliError::from(AdselError::io(path, source)))?;
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    log.write_entry(&LogEntry::for_summary(&summary, &digest, elapsed_ms));
    log.flush();

    match output_mode(cli) {
        OutputMode::Human => print_run_human(cli, &loaded.origin, &outcomes, &summary, &digest)?,
        OutputMode::Json => {
            let scenarios: Vec<Value> = outcomes
                .iter()
                .map(|o| {
                    json!({
                        "id": o.id,
                        "verdict": o.verdict,
                        "expectations": o.assertions().count(),
                        "failed": o.failed_assertions(),
                        "error": o.error,
                    })
                })
                .collect();
            let payload = json!({
                "command": "run",
                "source": loaded.origin,
                "scenarios": scenarios,
                "summary": summary,
                "digest": digest,
                "transcript": config.report.transcript.as_ref().map(|p| p.to_string_lossy()),
                "exit_code": summary.exit_code(),
            });
            write_json_line(&payload)?;
        }
    }

    Ok(summary.exit_code())
}

fn print_run_human(
    cli: &Cli,
    origin: &str,
    outcomes: &[ScenarioOutcome],
    summary: &RunSummary,
    digest: &str,
) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    if cli.quiet {
        if summary.exit_code() != 0 {
            write!(stdout, "{}", summary.render())?;
        }
        return Ok(());
    }

    if cli.verbose {
        writeln!(stdout, "{}", transcript::render_text(outcomes))?;
    } else {
        for outcome in outcomes {
            writeln!(stdout, "{} {}", verdict_label(outcome.verdict), outcome.id)?;
        }
        writeln!(stdout)?;
    }
    if outcomes.is_empty() {
        writeln!(stdout, "no scenarios found in {origin}")?;
    }
    write!(stdout, "{}", summary.render())?;
    writeln!(stdout, "transcript sha256: {digest}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn run_list(cli: &Cli, args: &ListArgs) -> Result<i32, CliError> {
    let mut config = load_config(cli)?;
    if let Some(pattern) = &args.source.pattern {
        config.runner.pattern.clone_from(pattern);
        config.validate()?;
    }
    let loaded = load_scenarios(
        cli,
        &config,
        args.source.root.as_deref(),
        args.source.filter.as_deref(),
    )?;

    match output_mode(cli) {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            for scenario in &loaded.scenarios {
                if cli.verbose {
                    writeln!(
                        stdout,
                        "{:<32} {} device(s), {} step(s), {} expectation(s)",
                        scenario.id,
                        scenario.spec.devices.len(),
                        scenario.spec.steps.len(),
                        scenario.spec.expectation_count()
                    )?;
                } else {
                    writeln!(stdout, "{}", scenario.id)?;
                }
            }
            for failed in &loaded.failed {
                let message = failed.error.as_ref().map_or("", |e| e.message.as_str());
                writeln!(stdout, "{} {}: {message}", "unreadable".yellow(), failed.id)?;
            }
        }
        OutputMode::Json => {
            let ids: Vec<&str> = loaded.scenarios.iter().map(|s| s.id.as_str()).collect();
            let failures: Vec<Value> = loaded
                .failed
                .iter()
                .map(|f| json!({ "id": f.id, "error": f.error }))
                .collect();
            let payload = json!({
                "command": "list",
                "source": loaded.origin,
                "scenarios": ids,
                "failures": failures,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// explain
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TraceStep {
    index: usize,
    ranking: Vec<Candidate>,
}

fn run_explain(cli: &Cli, args: &ExplainArgs) -> Result<i32, CliError> {
    let config = load_config(cli)?;
    let loaded = load_scenarios(cli, &config, args.root.as_deref(), None)?;

    if let Some(failed) = loaded.failed.into_iter().find(|o| o.id == args.scenario) {
        return finish_explain(cli, &failed, &[]);
    }
    let scenario = loaded
        .scenarios
        .iter()
        .find(|s| s.id == args.scenario)
        .ok_or_else(|| {
            CliError::Config(format!(
                "no scenario {:?} in {}",
                args.scenario, loaded.origin
            ))
        })?;

    let mut trace = Vec::with_capacity(scenario.spec.steps.len());
    let outcome = runner::run_scenario_observed(scenario, |record, sim| {
        trace.push(TraceStep {
            index: record.index,
            ranking: election::candidates(sim.plugged(), sim.log()),
        });
    });
    finish_explain(cli, &outcome, &trace)
}

fn finish_explain(
    cli: &Cli,
    outcome: &ScenarioOutcome,
    trace: &[TraceStep],
) -> Result<i32, CliError> {
    let summary = RunSummary::from_outcomes(std::slice::from_ref(outcome));
    match output_mode(cli) {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "scenario {}", outcome.id)?;
            let labels: Vec<String> = outcome.devices.iter().map(|d| d.label()).collect();
            writeln!(stdout, "  devices: {}", labels.join(" "))?;
            for (record, step) in outcome.records.iter().zip(trace) {
                let ranking: Vec<String> = step
                    .ranking
                    .iter()
                    .map(|c| {
                        let why = match c.reason {
                            election::Activation::FirstPlug => "plug",
                            election::Activation::Select => "select",
                        };
                        format!("{}@{}({why})", c.device.id, c.step)
                    })
                    .collect();
                let active = record
                    .active
                    .map_or_else(|| "-".to_string(), |d| d.id.to_string());
                let mut line = format!(
                    "  {:>3}. {:<24} active={active}  [{}]",
                    record.index,
                    transcript::step_text(&outcome.devices, record.step),
                    ranking.join(" ")
                );
                if let Some(assertion) = &record.assertion {
                    let mark = if assertion.passed() { "ok".green() } else { "MISMATCH".red() };
                    line.push_str(&format!("  expect {} {mark}", assertion.claimed.id));
                }
                writeln!(stdout, "{line}")?;
            }
            if let Some(err) = &outcome.error {
                writeln!(stdout, "  {} {}", "error:".red(), err.message)?;
            }
            writeln!(stdout, "  verdict: {}", verdict_label(outcome.verdict))?;
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "explain",
                "outcome": outcome,
                "trace": trace,
                "exit_code": summary.exit_code(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(summary.exit_code())
}

// ---------------------------------------------------------------------------
// gen
// ---------------------------------------------------------------------------

fn run_gen(cli: &Cli, args: &GenArgs) -> Result<i32, CliError> {
    let config = GeneratorConfig {
        seed: args.seed,
        count: args.count,
        devices: args.devices,
        steps: args.steps,
    };
    let scenarios = generator::generate(&config)?;
    let written = generator::write_scenarios(&args.out, &scenarios)?;

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                println!(
                    "Generated {} scenario(s) from seed {} in {}",
                    written.len(),
                    args.seed,
                    args.out.display()
                );
                if cli.verbose {
                    for path in &written {
                        println!("  {}", path.display());
                    }
                }
            }
        }
        OutputMode::Json => {
            let files: Vec<_> = written.iter().map(|p| p.to_string_lossy()).collect();
            let payload = json!({
                "command": "gen",
                "seed": args.seed,
                "out": args.out.to_string_lossy(),
                "files": files,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::Config(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// output helpers
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("ADSEL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

/// Human unless `--json`, `ADSEL_OUTPUT_FORMAT=json`, or `auto` on a pipe.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("auto") if !stdout_is_tty => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
