//! Myriad CLI - Command line interface
//!
//! Manifest-based execution: scripts and strings come from a JSON manifest,
//! one script is started, and the host is ticked until everything halts.

use std::path::PathBuf;
use std::process;

use clap::Parser;

mod logging;

use logging::LogFormat;
use myriad_api::{
    init_config, install, run_ticks, snapshot, Host, Manifest, RunConfig, ScriptState,
};
use myriad_config::{LogConfig, LogLevel};

#[derive(Parser)]
#[command(
    name = "myriad",
    about = "Myriad VM - run scripted behaviors from a JSON manifest",
    version = "0.1.0"
)]
struct Cli {
    /// Manifest file path (JSON)
    manifest: PathBuf,

    /// Script to start: a registered name, or a numeric id
    #[arg(long)]
    start: String,

    /// Argument bytes for the started script, comma separated (e.g. 1,2,255)
    #[arg(long, value_delimiter = ',')]
    args: Vec<u8>,

    /// Maximum number of ticks to run
    #[arg(long, default_value_t = 100)]
    ticks: u32,

    /// Execute one opcode per tick (debugging)
    #[arg(long)]
    single_step: bool,

    /// Dump a memory range of the started instance after the run: PTR:LEN
    #[arg(long, value_name = "PTR:LEN")]
    dump: Option<String>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format: pretty, compact, json
    #[arg(long, default_value = "compact")]
    log_format: String,
}

fn main() {
    let cli = Cli::parse();

    let log = LogConfig {
        global: parse_log_level(&cli.log_level).unwrap_or(LogLevel::Warn),
        ..LogConfig::default()
    };
    logging::init(&log, parse_log_format(&cli.log_format));
    init_config(RunConfig {
        single_step: cli.single_step,
        log: log.clone(),
        ..RunConfig::default()
    });

    // Read and parse the manifest
    let text = match std::fs::read_to_string(&cli.manifest) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", cli.manifest.display(), e);
            process::exit(1);
        }
    };
    let manifest = match Manifest::from_json(&text) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut host = Host::new();
    // 内置原生函数 0：把参数字节当文本打印
    host.register_special(0, |_script, args| {
        println!("{}", String::from_utf8_lossy(args));
    });

    let index = match install(&mut host, &manifest) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // Start the requested script: numeric ids take the id path, everything
    // else is looked up by name
    let library = host.library_mut(index).expect("library just installed");
    let started = match cli.start.parse::<u32>() {
        Ok(id) => library.start_script(id, &cli.args),
        Err(_) => library.start_named_script(&cli.start, &cli.args),
    };
    let pid = match started {
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let executed = run_ticks(&mut host, cli.ticks, cli.single_step);

    // Report final instance states（上个 tick 终止的实例在回收前仍可见）
    let library = host.library(index).expect("library still mounted");
    println!("[{} ticks]", executed);
    let mut faulted = false;
    for report in snapshot(library) {
        match report.state {
            ScriptState::Delayed => {
                println!("pid {:3}  {:?} ({} ticks left)", report.pid, report.state, report.state_data);
            }
            state => println!("pid {:3}  {:?}", report.pid, state),
        }
        if report.pid == pid && report.state.is_halted() && report.state != ScriptState::Terminated
        {
            faulted = true;
        }
    }

    if let Some(range) = &cli.dump {
        dump_memory(library, pid, range);
    }

    if faulted {
        process::exit(2);
    }
}

/// Parse log level string
fn parse_log_level(s: &str) -> Option<LogLevel> {
    match s.to_lowercase().as_str() {
        "silent" => Some(LogLevel::Error), // silent = only errors
        "error" => Some(LogLevel::Error),
        "warn" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "trace" => Some(LogLevel::Trace),
        _ => None,
    }
}

/// Parse log format string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

/// 打印启动实例的一段内存，格式 PTR:LEN
fn dump_memory(library: &myriad_api::Library, pid: myriad_api::Pid, range: &str) {
    let Some((ptr, len)) = range
        .split_once(':')
        .and_then(|(p, l)| Some((p.parse::<u32>().ok()?, l.parse::<u32>().ok()?)))
    else {
        eprintln!("Error: --dump expects PTR:LEN (e.g. 100:16)");
        return;
    };
    let Some(script) = library.running_script(pid) else {
        eprintln!("(instance {} already swept)", pid);
        return;
    };
    match script.read_memory(ptr, len) {
        Ok(bytes) => {
            for (offset, chunk) in bytes.chunks(16).enumerate() {
                let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
                println!("{:08x}  {}", ptr as usize + offset * 16, line.join(" "));
            }
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}
