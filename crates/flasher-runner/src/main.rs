//! `flasher`: control tower for the incline flasher.
//!
//! ```text
//! flasher serve --config tower.yaml         # run the command bridge
//! flasher request 127.0.0.1:9999 FLASH 20   # send one command
//! flasher last-response                     # show the last logged reply
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flasher_bridge_protocol::format_record;
use flasher_runner::{
    send_request, start_simulated, BridgeServer, FlasherConfig, ResponseLog, RunnerResult,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flasher", version, about = "Incline flasher control tower")]
struct Cli {
    /// Log filter (e.g. `debug`, `flasher_radio=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the command bridge against a simulated flasher site.
    Serve {
        /// YAML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the bridge listen address.
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Send one command line to a running bridge and print the reply.
    Request {
        /// Bridge address, e.g. 127.0.0.1:9999.
        addr: String,

        /// Command and arguments, e.g. `FLASH 20`.
        #[arg(required = true, num_args = 1..)]
        line: Vec<String>,
    },

    /// Print the most recent response log record.
    LastResponse {
        /// Response log file (default: from config, else response_logs.txt).
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// YAML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { config, bind } => serve(config, bind),
        Commands::Request { addr, line } => request(&addr, &line.join(" ")),
        Commands::LastResponse { log, config } => last_response(log, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> RunnerResult<FlasherConfig> {
    match path {
        Some(path) => FlasherConfig::load(&path),
        None => Ok(FlasherConfig::default()),
    }
}

fn serve(config: Option<PathBuf>, bind: Option<String>) -> RunnerResult<()> {
    let mut config = load_config(config)?;
    if let Some(bind) = bind {
        config.bridge.bind_addr = bind;
    }
    flasher_metrics::describe_metrics();

    let deployment = start_simulated(&config)?;
    let server = Arc::new(BridgeServer::new(&config, deployment.radio.handle()));

    let shutdown = Arc::new(Notify::new());
    let notify = shutdown.clone();
    ctrlc::set_handler(move || notify.notify_one())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let listener = TcpListener::bind(&config.bridge.bind_addr).await?;
        server.serve(listener, shutdown).await
    })?;

    info!("stopping radio");
    deployment.radio.shutdown();
    Ok(())
}

fn request(addr: &str, line: &str) -> RunnerResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let response = runtime.block_on(send_request(addr, line))?;
    print!("{}", response);
    Ok(())
}

fn last_response(log: Option<PathBuf>, config: Option<PathBuf>) -> RunnerResult<()> {
    let path = match log {
        Some(path) => path,
        None => load_config(config)?.response_log,
    };
    match ResponseLog::new(path.clone()).last()? {
        Some(record) => print!("{}", format_record(&record)),
        None => println!("no responses logged in {}", path.display()),
    }
    Ok(())
}
