//! `pickrig-cli` – PickRig Command Line Interface
//!
//! Entry point for the conveyor pick cell.
//!
//! ```text
//! pickrig run [--cycles N]     pick from the live rig (until Ctrl-C without --cycles)
//! pickrig sim                  one cycle against simulated devices
//! pickrig solve <dx> <dy> <dz> intercept time for an arm-frame offset (m)
//! pickrig config               write defaults if missing, then print the config
//! ```
//!
//! Ctrl-C flips the shared [`CancelToken`]; an active schedule aborts before
//! its next stage, a vision wait gives up within one poll slice, and the
//! conveyor is stopped.

mod config;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use pickrig_hal::RigDevices;
use pickrig_hal::sim::SimRig;
use pickrig_hal::ur_arm::UrArm;
use pickrig_hal::ur_conveyor::UrConveyor;
use pickrig_hal::ur_gripper::UrGripper;
use pickrig_hal::vision_link::VisionLink;
use pickrig_kernel::CancelToken;
use pickrig_kinematics::solve_intercept_time;
use pickrig_runtime::{CycleReport, RigMotionController, init_tracing};
use pickrig_types::{Clock, Detection, MonotonicClock, RigError};
use tracing::{error, warn};

use config::RigConfig;

/// Conveyor intercept pick controller.
#[derive(Parser, Debug)]
#[command(name = "pickrig", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Pick from the live rig.  Ctrl-C aborts the active cycle, including
    /// while it waits for a detection.
    Run {
        /// Stop after this many cycles (default: until Ctrl-C)
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// One cycle against simulated devices
    Sim,
    /// Intercept time for an arm-frame offset (m)
    Solve {
        #[arg(allow_negative_numbers = true)]
        dx: f64,
        #[arg(allow_negative_numbers = true)]
        dy: f64,
        #[arg(allow_negative_numbers = true)]
        dz: f64,
    },
    /// Write defaults if missing, then print the config
    Config,
}

fn main() {
    let _guard = init_tracing("pickrig");
    let cli = Cli::parse();

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = RigConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = cfg.validate() {
        eprintln!("{}: {}", "Invalid configuration".red().bold(), e);
        std::process::exit(1);
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – aborting the active cycle …".yellow().bold());
        handler_token.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; cycles cannot be interrupted");
    }

    let code = match cli.command {
        Command::Config => show_config(&cfg),
        Command::Solve { dx, dy, dz } => solve(&cfg, dx, dy, dz),
        Command::Sim => simulate(&cfg, &cancel),
        Command::Run { cycles } => run(&cfg, cycles, &cancel),
    };
    std::process::exit(code);
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn show_config(cfg: &RigConfig) -> i32 {
    let path = config::config_path();
    if !path.exists() {
        match config::save(cfg) {
            Ok(()) => println!(
                "  {} Default config written to {}\n",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                return 1;
            }
        }
    }
    match toml::to_string_pretty(cfg) {
        Ok(raw) => {
            println!("{raw}");
            0
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            1
        }
    }
}

fn solve(cfg: &RigConfig, dx: f64, dy: f64, dz: f64) -> i32 {
    let l = cfg.limits;
    match solve_intercept_time(dx, dy, dz, l.v_conveyor, l.v_max, l.a_max) {
        Ok(solution) => {
            println!(
                "  t_intercept = {} s  (v_conveyor {}, v_max {}, a_max {})",
                format!("{:.6}", solution.t_intercept()).bold().green(),
                l.v_conveyor,
                l.v_max,
                l.a_max
            );
            0
        }
        Err(e) => {
            println!("  {} {}", "✗".red().bold(), e);
            1
        }
    }
}

fn simulate(cfg: &RigConfig, cancel: &CancelToken) -> i32 {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);
    let sim = SimRig::new(clock.clone()).with_detection(Detection {
        dx: 5.0,
        dy: -10.0,
        theta: 12.0,
    });
    let log = sim.log();
    let mut controller = RigMotionController::new(cfg.controller(), sim.build(), clock);

    let result = controller.run_cycle(cancel);
    println!("  Commands issued:");
    for record in log.entries() {
        println!("    {:<9} {:?}", record.component.dimmed(), record.command);
    }
    report_cycle(result)
}

fn run(cfg: &RigConfig, cycles: Option<u64>, cancel: &CancelToken) -> i32 {
    let devices = match connect(cfg) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "rig connection failed");
            eprintln!("{}: {}", "Connection failed".red().bold(), e);
            return 1;
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);
    let mut controller = RigMotionController::new(cfg.controller(), devices, clock);

    let mut done = 0u64;
    while cycles.is_none_or(|n| done < n) && !cancel.is_cancelled() {
        let result = controller.run_cycle(cancel);
        let fatal = matches!(
            result,
            Err(RigError::CollaboratorFault { .. } | RigError::InvalidConfig(_))
        );
        let code = report_cycle(result);
        if fatal {
            return code;
        }
        done += 1;
    }
    println!("  {} {} cycle(s) run", "✓".green().bold(), done);
    0
}

/// Bring up every device: arm home, gripper handshake, conveyor server, vision.
fn connect(cfg: &RigConfig) -> Result<RigDevices, RigError> {
    let net = &cfg.network;
    let (gripper_settle, conveyor_settle, home_settle) = cfg.settle_times();

    println!("  Connecting arm at {}:{} …", net.arm_ip, net.arm_port);
    let mut arm = UrArm::connect((net.arm_ip.as_str(), net.arm_port))?;
    arm.go_home(cfg.schedule.home_pose, home_settle)?;

    println!("  Activating gripper at {}:{} …", net.arm_ip, net.gripper_port);
    let gripper = UrGripper::connect((net.arm_ip.as_str(), net.gripper_port), gripper_settle)?;

    println!(
        "  Waiting for conveyor controller on {}:{} …",
        net.conveyor_bind, net.conveyor_port
    );
    let conveyor = UrConveyor::host((net.conveyor_bind.as_str(), net.conveyor_port), conveyor_settle)?;

    println!("  Connecting vision at {}:{} …", net.vision_ip, net.vision_port);
    let vision = VisionLink::connect(
        (net.vision_ip.as_str(), net.vision_port),
        Arc::new(MonotonicClock),
    )?;

    Ok(RigDevices::new(
        Box::new(arm),
        Box::new(gripper),
        Box::new(conveyor),
        Box::new(vision),
    ))
}

fn report_cycle(result: Result<CycleReport, RigError>) -> i32 {
    match result {
        Ok(report) => {
            let status = if report.is_completed() {
                "completed".green().bold()
            } else {
                "aborted".yellow().bold()
            };
            println!(
                "  Cycle {} {} – t_intercept {:.3} s, {} fault(s)",
                report.id.to_string().dimmed(),
                status,
                report.plan.t_intercept,
                report.sync.faults.len()
            );
            if let Ok(json) = serde_json::to_string(&report) {
                tracing::debug!(report = %json, "cycle report");
            }
            0
        }
        Err(e) => {
            println!("  {} {}", "✗".red().bold(), e);
            1
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___  _      __   ___  _     "#.bold().cyan());
    println!("{}", r#"   / _ \(_)____/ /__/ _ \(_)__ _"#.bold().cyan());
    println!("{}", r#"  / ___/ / __/  '_/ , _/ / _ `/"#.bold().cyan());
    println!("{}", r#" /_/  /_/\__/_/\_\/_/|_/_/\_, / "#.bold().cyan());
    println!("{}", r#"                         /___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "PickRig".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Conveyor intercept pick controller");
    println!();
}
