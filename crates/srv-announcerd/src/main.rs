// # srv-announcerd - SRV Announcer Daemon
//
// Sidecar that keeps one entry of a DNS SRV record set (RFC 2782) in sync
// with the health of the local service: present while a TCP connect to the
// check target succeeds, absent while it fails.
//
// This is a THIN integration layer. It is responsible for:
// 1. Reading configuration from flags and `SRV_ANNOUNCER_*` environment variables
// 2. Initializing logging and the runtime
// 3. Building the record manager (Cloudflare or dry-run) and the TCP health check
// 4. Running the announcer until SIGINT/SIGTERM
//
// Reconciliation and retry behavior live in srv-announcer-core.
//
// ## Example
//
// ```bash
// export SRV_ANNOUNCER_ZONE_NAME=example.com
// export SRV_ANNOUNCER_SRV_RECORD_NAME=_sip._tcp.example.com
// export SRV_ANNOUNCER_SRV_RECORD_TARGET=node1.example.com.
// export SRV_ANNOUNCER_SRV_RECORD_PORT=5060
// export SRV_ANNOUNCER_CLOUDFLARE_API_TOKEN=your_token
//
// srv-announcerd
// ```

mod config;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use config::{Args, Backend, Settings};
use srv_announcer_check_tcp::TcpHealthCheck;
use srv_announcer_core::{
    Announcer, DryRunRecordManager, EngineConfig, EngineEvent, RecordManager,
};
use srv_announcer_provider_cloudflare::CloudflareSrvManager;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    DaemonExitCode::CleanShutdown.into()
                }
                _ => DaemonExitCode::ConfigError.into(),
            };
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!(
        record_set = %settings.record_name,
        entry = %settings.spec,
        check_target = %settings.check.target,
        dry_run = matches!(settings.backend, Backend::DryRun),
        "Starting srv-announcerd"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(settings)).into()
}

/// Run the daemon until a shutdown signal or a fatal error
async fn run_daemon(settings: Settings) -> DaemonExitCode {
    let cancel = CancellationToken::new();

    let mut signals = match ShutdownSignals::new() {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to set up signal handlers: {}", e);
            return DaemonExitCode::RuntimeError;
        }
    };

    let signal_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = signals.recv() => {
                    info!(signal, "Received shutdown signal");
                    cancel.cancel();
                }
            }
        }
    });

    let code = announce(&settings, cancel.clone()).await;

    // Fatal errors end the run without a signal
    cancel.cancel();
    let _ = signal_task.await;

    info!(exit_code = code as u8, "srv-announcerd stopped");
    code
}

/// Build the components and run the announcer
async fn announce(settings: &Settings, cancel: CancellationToken) -> DaemonExitCode {
    let manager: Box<dyn RecordManager> = match &settings.backend {
        Backend::DryRun => {
            info!("Dry-run mode: DNS will not be modified");
            Box::new(DryRunRecordManager::new(settings.record_name.clone()))
        }
        Backend::Cloudflare(config) => {
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Shutdown requested during zone lookup");
                    return DaemonExitCode::CleanShutdown;
                }
                result = CloudflareSrvManager::connect(config.clone()) => result,
            };

            match connected {
                Ok(manager) => Box::new(manager),
                Err(e) => {
                    error!(
                        zone = %config.zone_name,
                        error = %e,
                        "Failed to resolve zone"
                    );
                    return DaemonExitCode::ConfigError;
                }
            }
        }
    };

    let source = match TcpHealthCheck::from_config(&settings.check) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Invalid health check configuration");
            return DaemonExitCode::ConfigError;
        }
    };

    let (announcer, events) = match Announcer::new(
        Box::new(source),
        manager,
        settings.spec.clone(),
        &EngineConfig::default(),
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "Failed to create announcer");
            return DaemonExitCode::ConfigError;
        }
    };

    let event_task = tokio::spawn(log_events(events));

    let result = announcer.run(cancel).await;

    // The engine drops its event sender on return, which ends the logger
    let _ = event_task.await;

    match result {
        Ok(()) => DaemonExitCode::CleanShutdown,
        Err(e) if e.is_config() => {
            error!(error = %e, "Announcer stopped on a configuration error");
            DaemonExitCode::ConfigError
        }
        Err(e) => {
            error!(error = %e, "Announcer stopped on a fatal error");
            DaemonExitCode::RuntimeError
        }
    }
}

/// Drain engine events into the debug log
async fn log_events(mut events: tokio::sync::mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Engine event");
    }
}

/// SIGTERM and SIGINT listeners, registered up front so setup errors surface
/// before the announcer starts
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the next shutdown signal and return its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms (Ctrl-C only)
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
