//! fanwalld - chassis thermal-management daemon.
//!
//! Opens one or two powerboard serial links, runs the reconciliation
//! scheduler against them, and persists configuration through
//! `fanwall-core`'s four-document store.

mod fan_control;
mod link;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fanwall_core::Services;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

const DEFAULT_PORT_1: &str = "/dev/ttyUSB0";
const DEFAULT_PORT_2: &str = "/dev/ttyUSB1";

struct CliArgs {
    debug: bool,
    foreground: bool,
    port1: Option<String>,
    port2: Option<String>,
    config_dir: Option<String>,
}

fn print_help() {
    eprintln!("fanwalld {VERSION} - chassis thermal-management daemon");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    fanwalld [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -f, --foreground        Run in foreground (default; no daemonization)");
    eprintln!("        --debug             Verbose logging, including per-drive raw scan output");
    eprintln!("        --port1 PATH        Serial port for powerboard at location 1");
    eprintln!("        --port2 PATH        Serial port for powerboard at location 2");
    eprintln!("        --config-dir DIR    Override the configuration document directory");
    eprintln!("    -v, --version           Print version");
    eprintln!("    -h, --help              Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    FANWALL_LOG             Log level (trace, debug, info, warn, error)");
    eprintln!("    FANWALL_PORT_1          Serial port for location 1 (overridden by --port1)");
    eprintln!("    FANWALL_PORT_2          Serial port for location 2 (overridden by --port2)");
    eprintln!("    FANWALL_CONFIG_DIR      Configuration document directory");
}

fn print_version() {
    println!("fanwalld {VERSION}");
}

fn parse_args() -> Option<CliArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut out = CliArgs {
        debug: false,
        foreground: true,
        port1: None,
        port2: None,
        config_dir: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return None;
            }
            "-v" | "--version" => {
                print_version();
                return None;
            }
            "-f" | "--foreground" => out.foreground = true,
            "--debug" => out.debug = true,
            "--port1" => {
                i += 1;
                out.port1 = args.get(i).cloned();
            }
            "--port2" => {
                i += 1;
                out.port2 = args.get(i).cloned();
            }
            "--config-dir" => {
                i += 1;
                out.config_dir = args.get(i).cloned();
            }
            arg => {
                eprintln!("unknown argument: {arg}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    Some(out)
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let log_level = std::env::var("FANWALL_LOG").unwrap_or_else(|_| default_level.to_string());

    let use_journald = std::path::Path::new("/run/systemd/journal/socket").exists();
    if use_journald {
        match tracing_journald::layer() {
            Ok(layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("journald layer unavailable ({e}), falling back to stdout logging");
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(log_level)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // PHASE 0: a panic anywhere must be logged, never silently eaten.
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        eprintln!("PANIC at {location}: {message}");
    }));

    // PHASE 1: CLI flags.
    let Some(args) = parse_args() else {
        return Ok(());
    };

    if let Some(dir) = &args.config_dir {
        std::env::set_var("FANWALL_CONFIG_DIR", dir);
    }

    // PHASE 2: logging.
    init_logging(args.debug);
    info!(version = VERSION, foreground = args.foreground, "fanwalld starting");

    // PHASE 3: load configuration and bootstrap the sensor registry.
    let mut services = match Services::load() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "fatal: could not load configuration");
            std::process::exit(1);
        }
    };
    services.bootstrap();

    // PHASE 4: resolve and open powerboard links.
    let mut ports = HashMap::new();
    ports.insert(
        1u8,
        args.port1
            .or_else(|| std::env::var("FANWALL_PORT_1").ok())
            .unwrap_or_else(|| DEFAULT_PORT_1.to_string()),
    );
    ports.insert(
        2u8,
        args.port2
            .or_else(|| std::env::var("FANWALL_PORT_2").ok())
            .unwrap_or_else(|| DEFAULT_PORT_2.to_string()),
    );

    let control_state = Arc::new(fan_control::ControlState::new(services, &ports));
    if control_state.boards.is_empty() {
        warn!("no powerboards responded; fan walls will remain hidden until one is available");
    }

    // PHASE 5: Ctrl-C / SIGTERM flips the shutdown flag and wakes the
    // scheduler so an in-flight tick finishes but no new one starts.
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = shutdown_flag.clone();
    let control_state_for_handler = control_state.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("shutdown signal received");
        SHUTDOWN.store(true, Ordering::SeqCst);
        shutdown_for_handler.store(true, Ordering::SeqCst);
        control_state_for_handler.signal_reload();
    }) {
        warn!(error = %e, "failed to install signal handler");
    }

    // PHASE 6: run the control loop until shutdown.
    fan_control::run_control_loop(control_state, shutdown_flag).await;

    info!("fanwalld stopped");
    Ok(())
}
