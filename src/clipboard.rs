//! Clipboard access

use arboard::Clipboard;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Clipboard read failed: {0}")]
    Read(String),
}

/// Source of pasted text
pub trait ClipboardSource {
    fn read_text(&mut self) -> Result<String, ClipboardError>;
}

/// The desktop clipboard, opened on every read so a clipboard owner that
/// went away between reads does not wedge the tool.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        let mut clipboard =
            Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Nothing text-like on the clipboard reads as empty
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }
}
