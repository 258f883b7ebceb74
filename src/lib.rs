//! cpbcheck
//!
//! Keeps an FTP or SFTP session open and, on a hotkey, checks the file names
//! in the clipboard against the remote directory listing.

pub mod app;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod console;
pub mod reconcile;
pub mod remote;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{spawn_key_reader, App, RawModeGuard};
use cli::Cli;
use clipboard::SystemClipboard;
use config::{Settings, StorageError};
use console::Console;
use remote::{ConnectionParams, ParseError, TransportConnector, CONNECTION_STRING_FORMAT};
use session::{SessionError, SessionManager};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid connection string: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Settings error: {0}")]
    Storage(#[from] StorageError),

    #[error("Terminal error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize logging
///
/// The terminal belongs to the user-visible log, so diagnostics go to
/// `<config dir>/logs/cpbcheck.log`, or stderr when that cannot be opened.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = config::log_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("cpbcheck.log"))
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn load_settings(cli: &Cli) -> Result<Settings, StorageError> {
    let path = match &cli.settings {
        Some(path) => path.clone(),
        None => config::default_settings_path()?,
    };
    info!("Loading settings from {:?}", path);
    config::load_settings(&path).await
}

/// Connect, then serve hotkeys until quit.
///
/// Failures are written to the user-visible log before being returned.
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let mut console = Console::stdout(!cli.no_color);

    let settings = match load_settings(&cli).await {
        Ok(settings) => settings,
        Err(e) => {
            console.error(format!("settings: {}", e))?;
            return Err(e.into());
        }
    };

    let params = match ConnectionParams::parse(&cli.connection) {
        Ok(params) => params,
        Err(e) => {
            console.error(format!("connection string: {}", e))?;
            console.warning("format:")?;
            console.warning(format!("    {}", CONNECTION_STRING_FORMAT))?;
            return Err(e.into());
        }
    };

    let _raw_mode = RawModeGuard::enable()?;

    console.info("connecting...")?;
    let connector = Arc::new(TransportConnector::new(settings.dial_options()));
    let session = match SessionManager::connect(params, connector).await {
        Ok(session) => session,
        Err(e) => {
            console.error(&e)?;
            return Err(e.into());
        }
    };

    let mut app = App::new(session, console, SystemClipboard, settings.partial_suffix.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));

    let result = match spawn_key_reader(tx, settings.poll_interval(), stop.clone()) {
        Ok(reader) => {
            let result = match app.start(&mut rx).await {
                Ok(false) => app.dispatch(&mut rx).await,
                Ok(true) => Ok(()),
                Err(e) => Err(e),
            };
            stop.store(true, Ordering::Relaxed);
            if reader.join().is_err() {
                warn!("Key reader thread panicked");
            }
            result
        }
        Err(e) => Err(e),
    };

    app.shutdown().await;
    info!("Session closed");
    result.map_err(AppError::from)
}
