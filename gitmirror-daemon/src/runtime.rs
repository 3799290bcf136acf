use std::sync::Arc;

use tokio::sync::broadcast;

use gitmirror_core::{Config, RevisionSourceKind, SyncSettings};
use gitmirror_git::{GitCli, GitHubApi, LsRemote, RevisionSource};

use crate::coordinator::Coordinator;
use crate::error::{io_err, DaemonError};

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config, format: LogFormat) -> Result<(), DaemonError> {
    init_tracing(format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run every configured mirror until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    for skipped in &config.skipped {
        tracing::warn!(
            entry = skipped.index,
            repo = skipped.repo.as_deref().unwrap_or("<missing>"),
            reason = %skipped.reason,
            "skipping mirror"
        );
    }
    if config.mirrors.is_empty() {
        return Err(DaemonError::NoMirrors {
            skipped: config.skipped.len(),
        });
    }

    let settings = &config.settings;
    let gateway = Arc::new(GitCli::new().with_committer(settings.identity.clone()));
    let source = revision_source(settings);
    tracing::info!(
        mirrors = config.mirrors.len(),
        revision_source = %settings.revision_source,
        authenticated = settings.credential.is_some(),
        "starting gitmirror"
    );

    let coordinator = Coordinator::start(settings, &config.mirrors, gateway, source);
    let signal_result = wait_for_signal(coordinator.subscribe()).await;
    coordinator.stop();
    coordinator.join().await;
    signal_result
}

fn revision_source(settings: &SyncSettings) -> Arc<dyn RevisionSource> {
    match settings.revision_source {
        RevisionSourceKind::Github => Arc::new(GitHubApi::new(
            settings.api_base_url.clone(),
            settings.credential.clone(),
        )),
        RevisionSourceKind::LsRemote => Arc::new(LsRemote::new(settings.credential.clone())),
    }
}

/// Resolves on the first termination signal, or when something else has
/// already broadcast a stop.
async fn wait_for_signal(mut stopped: broadcast::Receiver<()>) -> Result<(), DaemonError> {
    let terminate = terminate_signal();
    tokio::select! {
        _ = stopped.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(DaemonError::Signal)?;
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
        signal = terminate => {
            signal?;
            tracing::info!("received SIGTERM, shutting down");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn terminate_signal() -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> Result<(), DaemonError> {
    std::future::pending().await
}

pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
