use clap::Parser;
use std::path::PathBuf;

use bindc::pipeline::{self, PipelineError};
use bindc::registry::ClassRegistry;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    /// Read passes as text
    Schedule,
    /// Full analysis report as JSON
    Json,
    /// Flag table
    Flags,
    /// Expression graph as Graphviz DOT
    Dot,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug)]
#[command(
    name = "bindc",
    version,
    about = "Binding compiler: plans dirty-flag reads for layout binding expressions"
)]
struct Cli {
    /// Layout description (JSON)
    source: PathBuf,

    /// Class description file (repeatable)
    #[arg(long = "classes")]
    classes: Vec<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Schedule)]
    emit: EmitStage,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit log level, overrides -v
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

fn setup_logging(verbose: u8, log_level: Option<LogLevel>) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_level);

    // ── Load class descriptions ──
    let mut registry = ClassRegistry::new();
    for path in &cli.classes {
        if let Err(e) = registry.load_file(path) {
            eprintln!("bindc: error: {}", e);
            std::process::exit(2);
        }
    }

    // ── Read layout ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bindc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    // ── Analyze ──
    let analysis = match pipeline::compile(&source, registry) {
        Ok(analysis) => analysis,
        Err(PipelineError::Diagnostics(diags)) => {
            for diag in &diags {
                eprint!("{}", diag.render());
            }
            eprintln!("bindc: {} binding expression(s) failed", diags.len());
            std::process::exit(1);
        }
        Err(e @ (PipelineError::Layout(_) | PipelineError::Registry(_))) => {
            eprintln!("bindc: error: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("bindc: error: {}", e);
            std::process::exit(1);
        }
    };

    let output = match cli.emit {
        EmitStage::Schedule => analysis.schedule.render(&analysis.model),
        EmitStage::Flags => analysis.flag_table(),
        EmitStage::Dot => bindc::dot::emit_dot(&analysis.model),
        EmitStage::Json => match analysis.report().to_json() {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("bindc: error: {}", e);
                std::process::exit(1);
            }
        },
    };

    // ── Write ──
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, output) {
                eprintln!("bindc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", output),
    }
}
