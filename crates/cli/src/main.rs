// cellgraph CLI - run sheet scripts against the cell graph engine

mod config;
mod exit_codes;
mod script;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use cellgraph_engine::Sheet;
use exit_codes::{EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};
use script::Runner;

#[derive(Parser)]
#[command(name = "cellgraph")]
#[command(about = "Run spreadsheet scripts against a dependency-tracked cell grid")]
#[command(version)]
#[command(after_help = "\
Script commands, one per line:
  set <A1> <text...>   Set cell text (=formula, 'escaped text, or plain text)
  clear <A1>           Clear a cell
  get <A1>             Print <cell>\\t<text>\\t<value>
  size                 Print printable size as <rows>x<cols>
  values | texts       Print the printable area, tab separated
  # ...                Comment

Examples:
  cellgraph budget.cg
  echo 'set A1 =1/4' | cellgraph -v")]
struct Cli {
    /// Script file to run (reads stdin when omitted or '-')
    script: Option<PathBuf>,

    /// TOML config file with a [sheet] table
    #[arg(long, short = 'c', env = "CELLGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Run every line even after an error; exit with the first error's code
    #[arg(long, short = 'k')]
    keep_going: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // Engine records arrive through the `log` bridge
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn read_script(path: Option<&PathBuf>) -> Result<String, CliError> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("cannot read script {}: {}", path.display(), e))),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| CliError::io(format!("cannot read stdin: {}", e)))?;
            Ok(source)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = match &cli.config {
        Some(path) => config::Settings::load(path)?,
        None => config::Settings::default(),
    };
    let source = read_script(cli.script.as_ref())?;
    let mut runner = Runner::new(Sheet::with_config(settings.sheet), cli.keep_going);

    let limits = runner.sheet().config();
    log::info!("sheet limits {}x{}, memoize={}", limits.max_rows, limits.max_cols, limits.memoize);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let result = runner.run(&source, &mut stdout.lock(), &mut stderr.lock());
    log::info!("{} cells allocated", runner.sheet().cell_count());

    // Error lines are already on stderr
    result.map_err(|e| CliError { code: e.exit_code(), message: String::new(), hint: None })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            let _ = io::stderr().flush();
            ExitCode::from(code)
        }
    }
}
