//! `asrs-cli` – the `asrs-twin` binary.
//!
//! 1. Loads `~/.asrs-twin/config.toml`, writing the defaults on first run.
//! 2. Loads the scene file (or the built-in demo rack).
//! 3. Starts the system loop, the diagnostic monitor, or both, on one
//!    [`TimerHost`].
//! 4. Stops every loop cleanly on **Ctrl-C**.
//!
//! ```text
//! asrs-twin [run|monitor|both] [--sim] [--drive SPEED] [--scene PATH]
//!           [--config PATH] [--interval MS]
//! ```

mod config;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use asrs_hal::SimScene;
use asrs_middleware::{PlcTransport, S7Client, SimPlc};
use asrs_runtime::{
    MonitorReport, PollLoop, SensorMonitor, TimerHost, init_tracing, start_monitor, start_system,
    stop_monitor, stop_system,
};
use asrs_types::{ControlBlock, ShuttleKind};

const DEMO_RACK: &str = include_str!("../../../demos/rack.toml");

/// Digital twin bridge for an S7-controlled shuttle rack.
#[derive(Debug, Parser)]
#[command(name = "asrs-twin", version, about)]
struct Cli {
    /// Which loops to start.
    #[arg(value_enum, default_value_t = Mode::Both)]
    mode: Mode,

    /// Use an in-memory PLC instead of the configured S7 endpoint.
    #[arg(long)]
    sim: bool,

    /// Seed the simulated ASRS control block so the shuttle moves; a
    /// negative speed drives in reverse.
    #[arg(long, value_name = "SPEED", requires = "sim", allow_negative_numbers = true)]
    drive: Option<f32>,

    /// Scene file to load instead of the configured one.
    #[arg(long, value_name = "PATH")]
    scene: Option<PathBuf>,

    /// Config file to use instead of `~/.asrs-twin/config.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the system loop period, in milliseconds.
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// System loop only.
    Run,
    /// Diagnostic monitor only; no PLC traffic.
    Monitor,
    /// System loop and monitor.
    Both,
}

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG (default "info"), ASRS_LOG_FORMAT=json, and
    // OTEL_EXPORTER_OTLP_ENDPOINT are honoured.  Reports still use println!.
    let _telemetry = init_tracing("asrs-twin");

    let opts = Cli::parse();

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let config_path = opts.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&config_path) {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config_path.display().to_string().bold()
            );
            cfg
        }
        Ok(None) => first_run(&config_path),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    if let Some(ms) = opts.interval {
        cfg.twin.poll_interval_ms = ms;
    }

    // ── Scene ─────────────────────────────────────────────────────────────
    let scene = match load_scene(&opts, &cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", "Scene error".red().bold(), e);
            std::process::exit(1);
        }
    };
    let scene = Rc::new(RefCell::new(scene));

    // ── Loops ─────────────────────────────────────────────────────────────
    let mut host = TimerHost::new();

    if matches!(opts.mode, Mode::Run | Mode::Both) {
        let transport = build_transport(&opts, &cfg);
        println!(
            "  PLC: {}",
            if opts.sim {
                "in-memory simulator".yellow()
            } else {
                cfg.plc.to_string().bold()
            }
        );
        let poll = Rc::new(RefCell::new(PollLoop::new(
            transport,
            cfg.plc.clone(),
            cfg.twin.clone(),
        )));
        if let Err(e) = start_system(&mut host, poll, Rc::clone(&scene)) {
            eprintln!("{}: {}", "Failed to start system loop".red(), e);
            std::process::exit(1);
        }
    }

    if matches!(opts.mode, Mode::Monitor | Mode::Both) {
        let monitor = SensorMonitor::new(cfg.twin.clone()).with_sink(print_report);
        if let Err(e) = start_monitor(&mut host, Rc::new(RefCell::new(monitor)), Rc::clone(&scene))
        {
            eprintln!("{}: {}", "Failed to start monitor".red(), e);
            std::process::exit(1);
        }
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping loops …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process to exit");
    }

    println!("\n  Running. Press {} to stop.\n", "Ctrl-C".bold().cyan());
    host.run_until(&shutdown);

    stop_system(&mut host);
    stop_monitor(&mut host);
    info!("twin stopped");
    println!("{}", "  ✓ Exiting ASRS twin.".green());
}

fn load_scene(opts: &Cli, cfg: &config::Config) -> Result<SimScene, String> {
    match opts.scene.as_ref().or(cfg.scene.as_ref()) {
        Some(path) => SimScene::load(path).map_err(|e| e.to_string()),
        None => {
            println!("  No scene configured; using the built-in demo rack.");
            SimScene::from_toml_str(DEMO_RACK).map_err(|e| e.to_string())
        }
    }
}

fn build_transport(opts: &Cli, cfg: &config::Config) -> Box<dyn PlcTransport> {
    if !opts.sim {
        return Box::new(S7Client::new());
    }
    let mut plc = SimPlc::new();
    if let Some(speed) = opts.drive {
        let block = ControlBlock {
            speed: speed.abs(),
            on: true,
            reverse: speed < 0.0,
            pickup: false,
        };
        plc.set_control(cfg.twin.asrs_control_db, &block, ShuttleKind::Asrs);
    }
    Box::new(plc)
}

// ─────────────────────────────────────────────────────────────────────────────
// First run
// ─────────────────────────────────────────────────────────────────────────────

fn first_run(path: &Path) -> config::Config {
    println!();
    println!("  No configuration found.  Writing defaults.");

    let mut cfg = config::Config::default();
    match config::save_to(&cfg, path) {
        Ok(()) => println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_report(report: &MonitorReport) {
    println!(
        "{}",
        format!(
            "[{}] SHUTTLE Sensor Readings ({} sensors found):",
            report.timestamp,
            report.readings.len()
        )
        .bold()
        .cyan()
    );
    for r in &report.readings {
        let status = match &r.hit {
            Some((_, name)) => format!("TRUE (Pallet: {name})").green(),
            None => "FALSE ()".dimmed(),
        };
        println!("  [{:<9}] {:<20} : {}", r.category.label(), r.name, status);
    }
    if report.end_of_rail {
        println!("{}", "    END OF RAIL".red().bold());
    }
    match report.aligned {
        Some(_) => println!("{}", "  **PALLET ALIGNED**".green().bold()),
        None => println!("{}", "   PALLET NOT ALIGNED".yellow()),
    }
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"    ___   _____ ____  _____    ______         _     "#.bold().cyan());
    println!("{}", r#"   /   | / ___// __ \/ ___/   /_  __/      __(_)___ "#.bold().cyan());
    println!("{}", r#"  / /| | \__ \/ /_/ /\__ \     / / | | /| / / / __ \"#.bold().cyan());
    println!("{}", r#" / ___ |___/ / _, _/___/ /    / /  | |/ |/ / / / / /"#.bold().cyan());
    println!("{}", r#"/_/  |_/____/_/ |_|/____/    /_/   |__/|__/_/_/ /_/ "#.bold().cyan());
    println!();
    println!("  {}", "Digital twin bridge for an S7-controlled shuttle rack".dimmed());
    println!();
}
