//! Configuration Management Module
//!
//! Loads the optional JSON settings file. Connection details come from the
//! command line, never from disk.

pub mod storage;
pub mod types;

pub use storage::{default_settings_path, load_settings, log_dir, StorageError};
pub use types::{Settings, SETTINGS_VERSION};
