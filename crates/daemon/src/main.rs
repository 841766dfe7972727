// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! civaultd: consumes CI and build-system events off the file queue and
//! projects them into per-artifact documents.
//!
//! Typically started by a process supervisor; not meant to be invoked
//! interactively beyond `--help`/`--version`.

mod config;
mod lifecycle;
mod loader;
mod store;

use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/civault/civaultd.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = match parse_args() {
        ArgsOutcome::Run(path) => path,
        ArgsOutcome::PrintedAndExit(code) => return code,
    };

    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let daemon = match lifecycle::Daemon::start(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("failed to start civaultd: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("civaultd ready");

    let queue_handle = daemon.queue_handle();
    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("failed to install signal handlers: {e}");
            return ExitCode::FAILURE;
        }
    };

    let run_future = daemon.run();
    tokio::pin!(run_future);

    let exit = loop {
        tokio::select! {
            exit = &mut run_future => break exit,
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                queue_handle.stop();
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                queue_handle.stop();
            }
        }
    };

    match &exit {
        loader::LoopExit::Shutdown => info!("civaultd stopped"),
        loader::LoopExit::Fatal(reason) => tracing::error!(%reason, "civaultd exiting on fatal error"),
    }

    ExitCode::from(exit.exit_code() as u8)
}

enum ArgsOutcome {
    Run(PathBuf),
    PrintedAndExit(ExitCode),
}

fn parse_args() -> ArgsOutcome {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("civaultd {}", env!("CARGO_PKG_VERSION"));
                return ArgsOutcome::PrintedAndExit(ExitCode::SUCCESS);
            }
            "--help" | "-h" => {
                print_help();
                return ArgsOutcome::PrintedAndExit(ExitCode::SUCCESS);
            }
            "--config" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => {
                    eprintln!("error: --config requires a path argument");
                    return ArgsOutcome::PrintedAndExit(ExitCode::FAILURE);
                }
            },
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("usage: civaultd [--config PATH]");
                return ArgsOutcome::PrintedAndExit(ExitCode::FAILURE);
            }
        }
    }

    ArgsOutcome::Run(config_path)
}

fn print_help() {
    println!("civaultd {}", env!("CARGO_PKG_VERSION"));
    println!("Consumes CI and build-system broker events into per-artifact documents.");
    println!();
    println!("USAGE:");
    println!("    civaultd [--config PATH]");
    println!();
    println!("OPTIONS:");
    println!("    --config PATH    Path to the TOML config file (default: {DEFAULT_CONFIG_PATH})");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}
