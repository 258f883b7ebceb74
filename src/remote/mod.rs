//! Remote filesystem access
//!
//! One protocol-agnostic [`RemoteClient`] contract with an FTP and an SFTP
//! implementation. Callers hold a `Box<dyn RemoteClient>` and never see the
//! concrete transport; a [`Connector`] produces fresh clients for the initial
//! connection and for reconnects.

pub mod error;
pub mod ftp;
pub mod ftp_list;
pub mod params;
pub mod path_utils;
pub mod sftp;
pub mod ssh;
pub mod transfer;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use error::RemoteError;
pub use ftp::FtpClient;
pub use params::{ConnectionParams, ParseError, Protocol, CONNECTION_STRING_FORMAT};
pub use path_utils::VirtualCwd;
pub use sftp::SftpClient;
pub use types::{EntryKind, RemoteEntry, RemoteListing};

/// Byte stream handed to [`RemoteClient::store_from`]
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Destination handed to [`RemoteClient::retrieve_from`]
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Timeouts applied while establishing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
    /// Bound on TCP connect plus login for FTP
    pub ftp_dial_timeout: Duration,
    /// Bound on the SSH handshake
    pub ssh_timeout: Duration,
    pub ssh_keepalive: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            ftp_dial_timeout: Duration::from_secs(5),
            ssh_timeout: Duration::from_secs(10),
            ssh_keepalive: Duration::from_secs(30),
        }
    }
}

/// Operations every remote backend provides.
///
/// Relative paths resolve against the backend's working directory, whether
/// the server keeps it (FTP) or the client does (SFTP).
#[async_trait]
pub trait RemoteClient: Send {
    fn protocol(&self) -> Protocol;

    /// List one directory. An empty path or `.` lists the working directory.
    async fn list(&mut self, path: &str) -> Result<RemoteListing, RemoteError>;

    async fn file_size(&mut self, path: &str) -> Result<i64, RemoteError>;

    /// Existence probe built on [`file_size`](Self::file_size).
    async fn exists(&mut self, path: &str) -> Result<bool, RemoteError> {
        exists_from_size(self.file_size(path).await)
    }

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError>;

    /// Write `source` into `path` starting at byte `offset`.
    ///
    /// Fails with [`RemoteError::OffsetMismatch`] before writing anything if
    /// the remote cursor cannot be placed exactly at `offset`. Returns the
    /// number of bytes sent.
    async fn store_from(
        &mut self,
        path: &str,
        source: ByteSource,
        offset: u64,
    ) -> Result<u64, RemoteError>;

    /// Copy `path` into `sink`, skipping its first `offset` bytes.
    async fn retrieve_from(
        &mut self,
        path: &str,
        sink: ByteSink,
        offset: u64,
    ) -> Result<u64, RemoteError>;

    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError>;

    async fn current_directory(&mut self) -> Result<String, RemoteError>;

    /// Release the session. Safe to call more than once.
    async fn quit(&mut self) -> Result<(), RemoteError>;
}

/// Map a size probe onto an existence answer: only `NotFound` means absent.
pub fn exists_from_size(result: Result<i64, RemoteError>) -> Result<bool, RemoteError> {
    match result {
        Ok(_) => Ok(true),
        Err(RemoteError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Factory for authenticated clients
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial and authenticate. Does not change directory.
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn RemoteClient>, RemoteError>;
}

/// Connector backed by the real FTP and SFTP transports
#[derive(Debug, Clone, Default)]
pub struct TransportConnector {
    options: DialOptions,
}

impl TransportConnector {
    pub fn new(options: DialOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for TransportConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn RemoteClient>, RemoteError> {
        match params.protocol {
            Protocol::Ftp => Ok(Box::new(FtpClient::connect(params, &self.options).await?)),
            Protocol::Sftp => Ok(Box::new(SftpClient::connect(params, &self.options).await?)),
        }
    }
}
