//! Session Management Module
//!
//! Owns the one live remote client and the cached directory listing.

pub mod manager;

pub use manager::{SessionError, SessionEvent, SessionManager, SessionState};
