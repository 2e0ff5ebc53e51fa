//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    date_range, eval_mode, precision, validate_data_config, validate_run_config,
};
use crate::domain::error::LineflowError;
use crate::domain::graph::{EvalMode, GraphBuilder};
use crate::domain::indicator::{Entry, ParamValue, catalog};
use crate::domain::program::{Definition, Program, ResultTable, SECTION as INDICATORS};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "lineflow", about = "Incremental technical indicator engine")]
pub struct Cli {
    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = parse_level)]
    pub log_level: Level,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the configured indicators over a symbol's bars
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        mode: Option<EvalMode>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Extra definition `name=EXPR`; replaces a configured one of the same name
        #[arg(short = 'e', long = "expr")]
        exprs: Vec<String>,
    },
    /// Check configuration and indicator wiring without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the indicator catalog
    List,
}

fn parse_level(s: &str) -> Result<Level, String> {
    s.parse()
        .map_err(|_| format!("unknown log level '{s}', expected error, warn, info, debug or trace"))
}

pub fn init_tracing(level: Level) {
    // a second call (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.log_level);
    match cli.command {
        Command::Run {
            config,
            mode,
            symbol,
            data_dir,
            output,
            exprs,
        } => run_run(
            &config,
            mode,
            symbol.as_deref(),
            data_dir.as_ref(),
            output.as_ref(),
            &exprs,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::List => run_list(),
    }
}

fn fail(err: LineflowError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Definitions from `[indicators]` plus command-line `name=EXPR` pairs.
/// Parse errors are printed with a caret under the offending position.
pub fn load_program(config: &dyn ConfigPort, extra: &[String]) -> Result<Program, ExitCode> {
    let mut pairs: Vec<(String, String)> = config
        .keys(INDICATORS)
        .into_iter()
        .map(|key| {
            let text = config.get_string(INDICATORS, &key).unwrap_or_default();
            (key, text)
        })
        .collect();

    for raw in extra {
        let Some((name, text)) = raw.split_once('=') else {
            return Err(fail(LineflowError::ConfigInvalid {
                section: INDICATORS.to_string(),
                key: raw.clone(),
                reason: "expected name=EXPR".to_string(),
            }));
        };
        let name = name.trim().to_string();
        pairs.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        pairs.push((name, text.trim().to_string()));
    }

    let mut defs = Vec::with_capacity(pairs.len());
    for (name, text) in pairs {
        match Definition::parse(&name, &text) {
            Ok(def) => defs.push(def),
            Err(e) => {
                eprintln!("error: [{}] {}:\n{}", INDICATORS, name, e.display_with_context(&text));
                return Err((&LineflowError::Parse(e)).into());
            }
        }
    }
    Program::new(defs).map_err(fail)
}

/// Wire `program`, load bars through `data` and evaluate them.
pub fn run_pipeline(
    config: &dyn ConfigPort,
    program: &Program,
    data: &dyn DataPort,
    mode: EvalMode,
) -> Result<ResultTable, LineflowError> {
    let symbol = config
        .get_string("data", "symbol")
        .map(|s| s.trim().to_string())
        .ok_or_else(|| LineflowError::ConfigMissing {
            section: "data".to_string(),
            key: "symbol".to_string(),
        })?;
    let (start, end) = date_range(config)?;

    let mut g = GraphBuilder::new();
    let outputs = program.wire(&mut g)?;
    let mut graph = g.build()?;

    let bars = data.fetch_ohlcv(&symbol, start, end)?;
    info!(symbol = %symbol, bars = bars.len(), ?mode, outputs = outputs.len(), "evaluating");
    graph.run(mode, &bars);

    for output in &outputs {
        let minperiod = graph.minperiod(output.line).unwrap_or(0);
        if minperiod > bars.len() {
            warn!(
                output = %output.name,
                minperiod,
                bars = bars.len(),
                "not enough bars; column has no values"
            );
        }
    }
    Ok(ResultTable::collect(&graph, &outputs))
}

fn run_run(
    config_path: &PathBuf,
    mode_override: Option<EvalMode>,
    symbol_override: Option<&str>,
    data_dir_override: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
    exprs: &[String],
) -> ExitCode {
    let mut adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Some(symbol) = symbol_override {
        adapter.set("data", "symbol", symbol);
    }
    if let Some(dir) = data_dir_override {
        adapter.set("data", "directory", &dir.display().to_string());
    }

    let checks = if exprs.is_empty() {
        validate_run_config(&adapter)
    } else {
        // definitions may come from the command line alone
        eval_mode(&adapter).and(precision(&adapter)).and(date_range(&adapter).map(|_| ()))
    };
    if let Err(e) = checks.and_then(|_| validate_data_config(&adapter)) {
        return fail(e);
    }

    let program = match load_program(&adapter, exprs) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if program.is_empty() {
        return fail(LineflowError::ConfigMissing {
            section: INDICATORS.to_string(),
            key: "<any>".to_string(),
        });
    }

    match execute_run(&adapter, &program, mode_override, output_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn execute_run(
    adapter: &FileConfigAdapter,
    program: &Program,
    mode_override: Option<EvalMode>,
    output_path: Option<&PathBuf>,
) -> Result<(), LineflowError> {
    let mode = match mode_override {
        Some(m) => m,
        None => eval_mode(adapter)?,
    };
    let directory = adapter.get_string("data", "directory").unwrap_or_default();
    let data = CsvAdapter::new(PathBuf::from(directory.trim()));
    let table = run_pipeline(adapter, program, &data, mode)?;

    let output = output_path.map(|p| p.display().to_string());
    CsvReportAdapter::new(precision(adapter)?).write(&table, output.as_deref())?;
    if let Some(path) = &output {
        eprintln!("Wrote {} rows to {}", table.len(), path);
    }
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_run_config(&adapter) {
        return fail(e);
    }
    let program = match load_program(&adapter, &[]) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let mut g = GraphBuilder::new();
    let wired = program.wire(&mut g).and_then(|outputs| {
        let graph = g.build()?;
        Ok((outputs, graph))
    });
    let (outputs, graph) = match wired {
        Ok(w) => w,
        Err(e) => return fail(e),
    };

    println!(
        "Config OK: {} definitions, {} output columns",
        program.definitions().len(),
        outputs.len()
    );
    for output in &outputs {
        println!(
            "  {} (minperiod {})",
            output.name,
            graph.minperiod(output.line).unwrap_or(0)
        );
    }
    ExitCode::SUCCESS
}

/// One catalog line: name, aliases, inputs, lines and parameter defaults.
pub fn format_entry(entry: &Entry) -> String {
    let aliases = entry.aliases();
    let params: Vec<String> = entry
        .params()
        .iter()
        .map(|p| format!("{}={}", p.name, ParamValue::from(p.default)))
        .collect();
    let mut out = entry.name();
    if !aliases.is_empty() {
        out.push_str(&format!(" ({})", aliases.join(", ")));
    }
    out.push_str(&format!(
        "\n    inputs: {}\n    lines: {}",
        entry.inputs().describe(),
        entry.lines().join(", ")
    ));
    if !params.is_empty() {
        out.push_str(&format!("\n    params: {}", params.join(", ")));
    }
    out
}

fn run_list() -> ExitCode {
    let entries = catalog::entries();
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    eprintln!("{} indicators", entries.len());
    ExitCode::SUCCESS
}
