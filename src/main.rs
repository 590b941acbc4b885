//! selfguard - run a command under a kill-guarded parent.
//!
//! Installs the seccomp kill-guard on this process first, then runs the
//! command through the shell. Nothing the command spawns can signal the
//! launcher (by pid or by process group).
//!
//! Commands:
//!   [--] COMMAND...   Protect, then run COMMAND via $SELFGUARD_SHELL -c
//!   --print-filter    Dump the BPF program for this pid as JSON
//!   --status          Show whether this build can enforce protection
//!   --help            Show usage

mod config;
mod logging;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::process::{self, Command, ExitStatus};

use log::{error, info, warn};
use serde::Serialize;

use selfguard::bpf::{self, SockFilter};
use selfguard::filter::{self, FilterProgram};
use selfguard::StartupGuard;

enum Action {
    Run(Vec<String>),
    PrintFilter,
    Status,
}

struct Cli {
    action: Action,
    no_protect: bool,
    verbose: bool,
}

fn print_usage() {
    eprintln!("selfguard - run a command that cannot signal its parent");
    eprintln!();
    eprintln!("Usage: selfguard [OPTIONS] [--] COMMAND...");
    eprintln!();
    eprintln!("  --no-protect          Run COMMAND without the kill-guard");
    eprintln!("  --print-filter        Print the BPF program for this pid as JSON");
    eprintln!("  --status              Show whether protection is supported here");
    eprintln!("  -v, --verbose         Debug logging");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}       shell used for COMMAND (default /bin/sh)", config::ENV_SHELL);
    eprintln!("  {}         log filter (default info)", config::ENV_LOG);
    eprintln!("  {}     1/true: same as --no-protect", config::ENV_DISABLE);
}

fn parse_args() -> Cli {
    let mut args = std::env::args().skip(1);
    let mut cli = Cli {
        action: Action::Run(Vec::new()),
        no_protect: false,
        verbose: false,
    };
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-protect" => cli.no_protect = true,
            "--print-filter" => cli.action = Action::PrintFilter,
            "--status" => cli.action = Action::Status,
            "-v" | "--verbose" => cli.verbose = true,
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "--" => {
                words.extend(args.by_ref());
                break;
            }
            other if other.starts_with('-') && words.is_empty() => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                process::exit(2);
            }
            _ => {
                words.push(arg);
                words.extend(args.by_ref());
                break;
            }
        }
    }

    if let Action::Run(_) = cli.action {
        if words.is_empty() {
            eprintln!("Missing COMMAND");
            eprintln!("  Example: selfguard -- 'kill -TERM $PPID'");
            print_usage();
            process::exit(2);
        }
        cli.action = Action::Run(words);
    }
    cli
}

fn main() {
    let cli = parse_args();
    let settings = config::Settings::from_env();
    logging::init_logger(cli.verbose, &settings.log_filter);

    let code = match cli.action {
        Action::Status => cmd_status(),
        Action::PrintFilter => cmd_print_filter(),
        Action::Run(words) => cmd_run(&words, cli.no_protect || settings.disabled, &settings),
    };
    process::exit(code);
}

fn cmd_status() -> i32 {
    match selfguard::arch::native() {
        Some(table) => {
            println!("Kill-guard: supported ({}, audit arch {:#010x})", table.name, table.audit_arch);
            println!(
                "Guarded syscalls: kill={} tkill={} tgkill={}",
                table.kill, table.tkill, table.tgkill
            );
        }
        None => {
            println!(
                "Kill-guard: NOT supported on {}/{} (installation is a no-op)",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }
    }
    0
}

#[derive(Serialize)]
struct FilterDump<'a> {
    arch: &'static str,
    audit_arch: u32,
    pid: u32,
    group: u32,
    program: &'a FilterProgram,
    instructions: Vec<SockFilter>,
}

fn cmd_print_filter() -> i32 {
    let program = match filter::build(process::id()) {
        Some(p) => p,
        None => {
            eprintln!("No syscall table for {}/{}", std::env::consts::OS, std::env::consts::ARCH);
            return 1;
        }
    };

    let dump = FilterDump {
        arch: program.arch,
        audit_arch: program.audit_arch,
        pid: program.identity.pid,
        group: program.identity.group,
        program: &program,
        instructions: bpf::encode(&program),
    };
    match serde_json::to_string_pretty(&dump) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Failed to serialize filter: {e}");
            1
        }
    }
}

fn cmd_run(words: &[String], no_protect: bool, settings: &config::Settings) -> i32 {
    // Start-up sequence owns the one-shot flag; nothing is spawned before it.
    let mut guard = StartupGuard::new();

    if no_protect {
        warn!("[seccomp] kill-guard disabled; children can signal pid {}", process::id());
    } else {
        match guard.protect() {
            Ok(protection) if protection.is_enforced() => {
                info!("[seccomp] {}", protection);
            }
            Ok(protection) => {
                warn!("[seccomp] {}; running without protection", protection);
            }
            Err(e) => {
                error!("[fatal] kill-guard install failed ({:?}): {}", e.kind(), e);
                return 1;
            }
        }
    }

    let script = words.join(" ");
    info!("[run] {} -c {:?}", settings.shell.display(), script);
    match Command::new(&settings.shell).arg("-c").arg(&script).status() {
        Ok(status) => exit_code(status),
        Err(e) => {
            error!("[fatal] failed to start {}: {}", settings.shell.display(), e);
            127
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
