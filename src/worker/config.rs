//! Command-line configuration shared by the KVS and Flame worker binaries.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HEARTBEAT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub port: u16,
    /// Storage directory; only the KVS worker has one.
    pub dir: Option<PathBuf>,
    /// `ip:port` of the coordinator.
    pub coordinator: String,
    pub log_level: tracing::Level,
    pub heartbeat: Duration,
}

impl WorkerConfig {
    /// Parses `--port`, `--coordinator`, `--dir`, `--log` and `--heartbeat-secs`.
    ///
    /// `args` excludes the program name.
    pub fn parse(args: &[String], require_dir: bool) -> Result<Self> {
        let mut port = None;
        let mut dir = None;
        let mut coordinator = None;
        let mut log_level = tracing::Level::INFO;
        let mut heartbeat = Duration::from_secs(DEFAULT_HEARTBEAT_SECS);

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .map(String::as_str)
                    .with_context(|| format!("{} needs a value", flag))
            };

            match flag {
                "--port" => {
                    port = Some(value()?.parse::<u16>().context("--port must be a port number")?);
                }
                "--dir" => dir = Some(PathBuf::from(value()?)),
                "--coordinator" => coordinator = Some(value()?.to_string()),
                "--log" => {
                    log_level = value()?
                        .parse()
                        .context("--log must be one of trace, debug, info, warn, error")?;
                }
                "--heartbeat-secs" => {
                    let secs: u64 = value()?
                        .parse()
                        .context("--heartbeat-secs must be a whole number")?;
                    if secs == 0 {
                        bail!("--heartbeat-secs must be positive");
                    }
                    heartbeat = Duration::from_secs(secs);
                }
                other => bail!("unknown argument '{}'", other),
            }
            i += 2;
        }

        let port = port.context("--port is required")?;
        let coordinator = coordinator.context("--coordinator is required")?;
        if !coordinator.contains(':') {
            bail!("--coordinator must be ip:port, got '{}'", coordinator);
        }
        if require_dir && dir.is_none() {
            bail!("--dir is required");
        }

        Ok(Self {
            port,
            dir,
            coordinator,
            log_level,
            heartbeat,
        })
    }

    /// Parses the process arguments, printing usage and exiting with 1 on error.
    pub fn from_args(require_dir: bool) -> Self {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("worker");

        match Self::parse(args.get(1..).unwrap_or(&[]), require_dir) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                if require_dir {
                    eprintln!(
                        "Usage: {} --port <port> --dir <path> --coordinator <ip:port> [--log <level>] [--heartbeat-secs <n>]",
                        program
                    );
                    eprintln!("Example: {} --port 8001 --dir worker1 --coordinator 127.0.0.1:8000", program);
                } else {
                    eprintln!(
                        "Usage: {} --port <port> --coordinator <ip:port> [--log <level>] [--heartbeat-secs <n>]",
                        program
                    );
                    eprintln!("Example: {} --port 9001 --coordinator 127.0.0.1:9000", program);
                }
                std::process::exit(1);
            }
        }
    }
}
