//! clammer - command-line client for clamd.

mod cli;

use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

use clammer_client::Client;
use clammer_core::{ClamError, Config, FileConfig, ReadMode, ScanResult};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CLAMMER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = cli::Cli::parse();

    let file_config = match FileConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("clammer: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match build_config(&cli, &file_config) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("clammer: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            warn!(%e, "command failed");
            eprintln!("clammer: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Merge precedence: CLI flag / env var, then config file, then defaults.
fn build_config(cli: &cli::Cli, file: &FileConfig) -> Result<Config, ClamError> {
    let defaults = Config::default();

    let address = match cli.address.as_deref().or(file.address.as_deref()) {
        Some(raw) => raw.parse()?,
        None => defaults.address,
    };

    let timeout = cli
        .timeout
        .or(file.timeout_secs)
        .map_or(defaults.timeout, Duration::from_secs);

    let read_mode = if cli.tolerant_reads || file.tolerant_reads.unwrap_or(false) {
        ReadMode::Tolerant
    } else {
        ReadMode::Strict
    };

    let chunk_size = cli
        .chunk_size
        .or(file.chunk_size)
        .unwrap_or(defaults.chunk_size);

    Ok(Config {
        address,
        timeout,
        read_mode,
        chunk_size,
    })
}

fn run(command: &cli::Command, config: &Config) -> Result<ExitCode, ClamError> {
    let mut client = Client::connect(config)?;

    match command {
        cli::Command::Ping => {
            client.ping()?;
            println!("PONG");
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Version => {
            println!("{}", client.version()?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Stats => {
            println!("{}", client.stats()?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Reload => {
            println!("{}", client.reload()?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Shutdown => {
            client.shutdown()?;
            debug!("daemon acknowledged shutdown");
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Scan { path } => Ok(report(&client.scan_file(path)?)),
        cli::Command::Multiscan { path } => Ok(report(&client.multiscan_file(path)?)),
        cli::Command::Contscan { path } => Ok(report(&client.cont_scan(path)?)),
        cli::Command::Instream { file } => {
            let result = match file {
                Some(path) => client.scan_local_file(path, config.chunk_size)?,
                None => {
                    let mut payload = Vec::new();
                    std::io::stdin().read_to_end(&mut payload)?;
                    client.scan_bytes(&payload, config.chunk_size)?
                }
            };
            Ok(report(&result))
        }
    }
}

fn report(result: &ScanResult) -> ExitCode {
    match result.reason() {
        Some(reason) => println!("{}: {} ({reason})", result.filename(), result.status()),
        None => println!("{}: {}", result.filename(), result.status()),
    }
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
