//! Interactive event loop
//!
//! A reader thread turns hotkeys into [`Command`]s; [`App::dispatch`] runs
//! them one at a time. Commands that arrive while one is running are dropped
//! rather than queued, except `Quit`.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clipboard::ClipboardSource;
use crate::console::{Console, SEPARATOR};
use crate::reconcile::reconcile;
use crate::session::{SessionEvent, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-read the remote directory
    Refresh,
    /// Reconcile the clipboard against the cached listing
    Check,
    Quit,
}

/// Ctrl-R refresh, Ctrl-S check, Ctrl-Q or Ctrl-C quit
pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press || !key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'r' => Some(Command::Refresh),
            's' => Some(Command::Check),
            'q' | 'c' => Some(Command::Quit),
            _ => None,
        },
        _ => None,
    }
}

/// Raw terminal mode for as long as the guard lives
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Poll the terminal for hotkeys on a dedicated thread.
///
/// The thread exits when `stop` is set, when the receiver is gone, or after
/// a terminal error (which is forwarded as `Quit`).
pub fn spawn_key_reader(
    tx: mpsc::UnboundedSender<Command>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("key-reader".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let event = match event::poll(poll_interval) {
                    Ok(true) => event::read(),
                    Ok(false) => continue,
                    Err(e) => Err(e),
                };
                match event {
                    Ok(Event::Key(key)) => {
                        if let Some(command) = command_for_key(&key) {
                            debug!("Hotkey {:?}", command);
                            if tx.send(command).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Terminal input failed: {}", e);
                        let _ = tx.send(Command::Quit);
                        break;
                    }
                }
            }
            debug!("Key reader stopped");
        })
}

/// Drop every queued command; `true` when one of them was `Quit`.
fn discard_pending(commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    let mut quit = false;
    while let Ok(pending) = commands.try_recv() {
        match pending {
            Command::Quit => quit = true,
            other => debug!("Dropping {:?} pressed while busy", other),
        }
    }
    quit
}

pub struct App<W: Write, C: ClipboardSource> {
    session: SessionManager,
    console: Console<W>,
    clipboard: C,
    partial_suffix: String,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<W: Write, C: ClipboardSource> App<W, C> {
    pub fn new(
        session: SessionManager,
        console: Console<W>,
        clipboard: C,
        partial_suffix: impl Into<String>,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            session: session.with_events(tx),
            console,
            clipboard,
            partial_suffix: partial_suffix.into(),
            events,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Initial listing and status block.
    ///
    /// The key reader is already running, so hotkeys pressed during the first
    /// listing are dropped like any other busy press. Returns whether a `Quit`
    /// arrived in that window.
    pub async fn start(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> io::Result<bool> {
        self.reload().await?;
        self.console.status_block(self.session.params())?;
        Ok(discard_pending(commands))
    }

    /// Run commands until `Quit` or until every sender is gone.
    pub async fn dispatch(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> io::Result<()> {
        while let Some(command) = commands.recv().await {
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
            if discard_pending(commands) {
                break;
            }
        }
        info!("Leaving dispatch loop");
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> io::Result<()> {
        match command {
            Command::Refresh => {
                self.console.info(SEPARATOR)?;
                self.reload().await?;
                self.console.status_block(self.session.params())
            }
            Command::Check => {
                self.check()?;
                self.console.info(SEPARATOR)?;
                self.console.status_block(self.session.params())
            }
            Command::Quit => Ok(()),
        }
    }

    /// Release the remote session
    pub async fn shutdown(&mut self) {
        self.session.close().await;
    }

    async fn reload(&mut self) -> io::Result<()> {
        self.console.info("reading remote directory...")?;
        let result = self
            .session
            .refresh("")
            .await
            .map(|listing| listing.len());

        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::ConnectionLost { .. } => self.console.warning("lost connection")?,
                SessionEvent::Reconnecting => self.console.info("reconnecting...")?,
                SessionEvent::Reconnected => self.console.info("reading remote directory...")?,
            }
        }

        match result {
            Ok(count) => {
                info!("Listing holds {} entries", count);
                Ok(())
            }
            Err(e) => {
                error!("Refresh failed: {}", e);
                self.console.error(e)
            }
        }
    }

    fn check(&mut self) -> io::Result<()> {
        let text = match self.clipboard.read_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Clipboard read failed: {}", e);
                self.console.error(e)?;
                String::new()
            }
        };

        let findings = reconcile(&text, self.session.listing(), &self.partial_suffix);
        debug!("Checked {} clipboard lines", findings.len());
        for finding in &findings {
            self.console.finding(finding)?;
        }
        Ok(())
    }
}
