//! netcp CLI
//!
//! Best-effort file transfer over UDP datagrams, plus a launcher that runs a
//! command with one standard stream redirected through a pipe.

mod config;
mod progress;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use netcp_core::shutdown::signal_name;
use netcp_core::{
    Endpoint, EnvConfig, FileReceiver, FileSender, ShutdownToken, SignalGuard, TransferOutcome,
    TransferReport,
};
use netcp_files::FileChunker;
use netcp_process::{Redirection, Subprocess};

use config::Config;
use progress::{TransferProgress, format_bytes, format_duration, format_speed};

/// netcp - copy a file over UDP
#[derive(Parser)]
#[command(name = "netcp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (default: ~/.config/netcp/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file to a receiver
    Send {
        /// File to send
        #[arg(required = true)]
        file: PathBuf,

        /// Destination ip[:port] (overrides NETCP_IP / NETCP_PORT)
        #[arg(long)]
        to: Option<String>,

        /// Local ip[:port] to send from
        #[arg(long)]
        from: Option<String>,
    },

    /// Receive a file
    Receive {
        /// Destination file (created or truncated)
        #[arg(required = true)]
        file: PathBuf,

        /// Listen ip[:port] (overrides NETCP_IP / NETCP_PORT)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run a command with one stream redirected through a pipe
    Run {
        /// Stream to redirect
        #[arg(long, value_enum, default_value_t = RedirectArg::Stdout)]
        redirect: RedirectArg,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<OsString>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RedirectArg {
    Stdin,
    Stdout,
    Stderr,
    Combined,
}

impl From<RedirectArg> for Redirection {
    fn from(arg: RedirectArg) -> Self {
        match arg {
            RedirectArg::Stdin => Self::Stdin,
            RedirectArg::Stdout => Self::Stdout,
            RedirectArg::Stderr => Self::Stderr,
            RedirectArg::Combined => Self::Combined,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("netcp: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    // Validate configuration
    config.validate()?;

    init_logging(cli.verbose, &config.logging.level);

    let shutdown = ShutdownToken::new();
    let _guard = SignalGuard::install(shutdown.clone()).context("cannot install signal handlers")?;
    let env = EnvConfig::from_env();

    match cli.command {
        Commands::Send { file, to, from } => {
            send_file(file, to, from, &config, &env, shutdown).await
        }
        Commands::Receive { file, bind } => {
            receive_file(file, bind, &config, &env, shutdown).await
        }
        Commands::Run { redirect, command } => {
            run_command(redirect.into(), command, shutdown).await
        }
    }
}

fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { level }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Send a file to the configured destination
async fn send_file(
    file: PathBuf,
    to: Option<String>,
    from: Option<String>,
    config: &Config,
    env: &EnvConfig,
    shutdown: ShutdownToken,
) -> anyhow::Result<ExitCode> {
    let metadata =
        std::fs::metadata(&file).with_context(|| format!("cannot send {}", file.display()))?;
    if metadata.is_dir() {
        anyhow::bail!("cannot send {}: is a directory", file.display());
    }

    let destination = config.destination(to.as_deref(), env)?;
    let transfer = config.transfer_config();
    let chunker = FileChunker::with_chunk_size(transfer.chunk_size);
    let file_size = metadata.len();
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    tracing::info!("Sending {:?} to {}", file, destination);
    println!("File: {}", file.display());
    println!(
        "Size: {} ({} datagrams)",
        format_bytes(file_size),
        chunker.datagram_count(file_size)
    );
    println!("Destination: {destination}");

    let mut sender = FileSender::new(destination, transfer);
    if let Some(from) = from {
        let local: Endpoint = from
            .parse()
            .with_context(|| format!("invalid --from address {from}"))?;
        sender = sender.with_local(local);
    }

    let progress = TransferProgress::new(file_size, &filename);
    let bar = progress.clone();
    let sender = sender.with_progress(move |bytes| bar.update(bytes));

    let token = shutdown.clone();
    let result = tokio::task::spawn_blocking(move || sender.send(&file, &token)).await?;

    finish(result, &progress, &shutdown, "Sent")
}

/// Receive a file on the configured endpoint
async fn receive_file(
    file: PathBuf,
    bind: Option<String>,
    config: &Config,
    env: &EnvConfig,
    shutdown: ShutdownToken,
) -> anyhow::Result<ExitCode> {
    let endpoint = config.bind_endpoint(bind.as_deref(), env)?;
    let receiver = FileReceiver::bind(endpoint, config.transfer_config())
        .with_context(|| format!("cannot listen on {endpoint}"))?;
    let local = receiver.local_endpoint()?;

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    println!("Output: {}", file.display());
    println!("Listening on: {local}");

    let progress = TransferProgress::spinner(&filename);
    let bar = progress.clone();
    let receiver = receiver.with_progress(move |bytes| bar.update(bytes));

    let token = shutdown.clone();
    let result = tokio::task::spawn_blocking(move || receiver.receive(&file, &token)).await?;

    finish(result, &progress, &shutdown, "Received")
}

fn finish(
    result: netcp_core::Result<TransferReport>,
    progress: &TransferProgress,
    shutdown: &ShutdownToken,
    verb: &str,
) -> anyhow::Result<ExitCode> {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            progress.abandon();
            return Err(e.into());
        }
    };

    match report.outcome {
        TransferOutcome::Complete => {
            let peer = report
                .peer
                .map(|p| format!(" ({p})"))
                .unwrap_or_default();
            progress.finish_with_message(format!(
                "{verb} {} in {} datagrams{peer}, {} at {}",
                format_bytes(report.bytes),
                report.chunks,
                format_duration(report.elapsed),
                format_speed(report.throughput()),
            ));
            Ok(ExitCode::SUCCESS)
        }
        TransferOutcome::Interrupted => {
            progress.abandon();
            eprintln!("Interrupted after {}", format_bytes(report.bytes));
            Ok(ExitCode::from(interrupted_status(shutdown)))
        }
    }
}

/// Run a command with one redirected stream
async fn run_command(
    redirection: Redirection,
    command: Vec<OsString>,
    shutdown: ShutdownToken,
) -> anyhow::Result<ExitCode> {
    let mut child = Subprocess::new(&command, redirection)?.foreground(true);
    child.exec()?;

    let pid = child.pid().unwrap_or_default();
    eprintln!("{} started (pid {pid}, {redirection} redirected)", command[0].to_string_lossy());

    let relay = match redirection {
        Redirection::Stdin => {
            let mut pipe = child.take_stdin()?;
            // Our stdin may never close; the thread is left detached.
            std::thread::spawn(move || {
                let _ = io::copy(&mut io::stdin().lock(), &mut pipe);
            });
            None
        }
        Redirection::Stdout | Redirection::Combined => Some(child.take_stdout()?),
        Redirection::Stderr => Some(child.take_stderr()?),
    }
    .map(|mut pipe| {
        std::thread::spawn(move || io::copy(&mut pipe, &mut io::stdout().lock()))
    });

    let early_exit = loop {
        if shutdown.is_cancelled() {
            tracing::warn!(pid, "killing child");
            child.kill()?;
            break Some(interrupted_status(&shutdown));
        }
        if !child.is_alive() {
            break None;
        }
        // nothing would resume it
        if let Some(signo) = child.stopped_signal() {
            eprintln!("child stopped (signal {signo}: {}), killing it", signal_name(signo));
            child.kill()?;
            break Some((128 + signo) as u8);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    let status = child.wait()?;

    if let Some(relay) = relay {
        match relay.join() {
            Ok(Ok(bytes)) => tracing::debug!(bytes, "relay finished"),
            Ok(Err(e)) => tracing::warn!("relay failed: {}", e),
            Err(_) => tracing::warn!("relay thread panicked"),
        }
    }

    if let Some(code) = early_exit {
        return Ok(ExitCode::from(code));
    }

    Ok(ExitCode::from(child_status(status)))
}

/// Our exit status mirroring the child's: its code, or `128 + signal`
fn child_status(status: Option<std::process::ExitStatus>) -> u8 {
    use std::os::unix::process::ExitStatusExt;

    let Some(status) = status else {
        return 1;
    };
    tracing::debug!(%status, "child exited");
    match (status.code(), status.signal()) {
        (Some(code), _) => code as u8,
        (None, Some(signo)) => (128 + signo) as u8,
        _ => 1,
    }
}

fn interrupted_status(shutdown: &ShutdownToken) -> u8 {
    let signo = shutdown.signal().unwrap_or(libc::SIGINT);
    (128 + signo) as u8
}
