//! SFTP adapter
//!
//! SFTP requests carry full paths and the protocol has no session working
//! directory, so the adapter keeps a [`VirtualCwd`] and resolves every path
//! argument against it before it reaches the wire.

use async_trait::async_trait;
use chrono::DateTime;
use russh::client;
use russh_sftp::client::error::Error as SftpErrorInner;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::RemoteError;
use super::params::{ConnectionParams, Protocol};
use super::path_utils::VirtualCwd;
use super::ssh::{self, SshHandler};
use super::transfer::{read_from_offset, write_from_offset};
use super::types::{checked_size, EntryKind, RemoteEntry, RemoteListing};
use super::{exists_from_size, ByteSink, ByteSource, DialOptions, RemoteClient};

/// Live SSH connection plus the SFTP channel riding on it
struct SftpConnection {
    handle: client::Handle<SshHandler>,
    sftp: RusshSftpSession,
}

pub struct SftpClient {
    conn: Option<SftpConnection>,
    cwd: VirtualCwd,
    address: String,
}

impl SftpClient {
    /// Handshake, authenticate, open the `sftp` subsystem and seed the
    /// working directory from the server's notion of `.`.
    pub async fn connect(
        params: &ConnectionParams,
        options: &DialOptions,
    ) -> Result<Self, RemoteError> {
        let address = params.address();
        let handle = ssh::connect(params, options).await?;

        info!("Opening SFTP subsystem on {}", address);
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| RemoteError::Connect(format!("Failed to open channel: {}", e)))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            RemoteError::Connect(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        let home = sftp
            .canonicalize(".")
            .await
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        info!("SFTP subsystem opened, working directory {}", home);

        Ok(Self {
            conn: Some(SftpConnection { handle, sftp }),
            cwd: VirtualCwd::new(&home),
            address,
        })
    }

    fn sftp(&self) -> Result<&RusshSftpSession, RemoteError> {
        self.conn.as_ref().map(|c| &c.sftp).ok_or(RemoteError::Closed)
    }
}

/// Map SFTP errors to our error type
fn map_sftp_error(err: SftpErrorInner, path: &str) -> RemoteError {
    let err_str = err.to_string();
    if err_str.contains("No such file") || err_str.contains("not found") {
        RemoteError::NotFound(path.to_string())
    } else if err_str.contains("Timeout") || err_str.contains("timed out") {
        RemoteError::Timeout(err_str)
    } else {
        RemoteError::Protocol(err_str)
    }
}

/// Size of an entry as `i64`. Directories may omit it; files may not.
fn entry_size(name: &str, size: Option<u64>, kind: EntryKind) -> Result<i64, RemoteError> {
    match (size, kind) {
        (Some(size), _) => checked_size(name, size),
        (None, EntryKind::Directory) => Ok(0),
        (None, _) => Err(RemoteError::Protocol(format!(
            "server reported no size for {:?}",
            name
        ))),
    }
}

async fn stat_size(sftp: &RusshSftpSession, path: &str) -> Result<i64, RemoteError> {
    let metadata = sftp
        .metadata(path)
        .await
        .map_err(|e| map_sftp_error(e, path))?;
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    entry_size(path, metadata.size, kind)
}

#[async_trait]
impl RemoteClient for SftpClient {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    async fn list(&mut self, path: &str) -> Result<RemoteListing, RemoteError> {
        let resolved = self.cwd.resolve(path);
        debug!("Listing directory: {}", resolved);

        let read_dir = self
            .sftp()?
            .read_dir(&resolved)
            .await
            .map_err(|e| map_sftp_error(e, &resolved))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let metadata = entry.metadata();
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else if metadata.is_regular() {
                EntryKind::File
            } else {
                EntryKind::Unknown
            };
            let size = entry_size(&name, metadata.size, kind)?;
            let modified = metadata
                .mtime
                .and_then(|t| DateTime::from_timestamp(t as i64, 0));

            entries.push(RemoteEntry {
                name,
                size,
                modified,
                kind,
            });
        }

        debug!("Listed {} entries in {}", entries.len(), resolved);
        Ok(RemoteListing::new(resolved, entries))
    }

    async fn file_size(&mut self, path: &str) -> Result<i64, RemoteError> {
        let resolved = self.cwd.resolve(path);
        stat_size(self.sftp()?, &resolved).await
    }

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError> {
        let resolved = self.cwd.resolve(path);
        info!("Deleting: {}", resolved);
        let sftp = self.sftp()?;

        let metadata = sftp
            .metadata(&resolved)
            .await
            .map_err(|e| map_sftp_error(e, &resolved))?;
        let removed = if metadata.is_dir() {
            sftp.remove_dir(&resolved).await
        } else {
            sftp.remove_file(&resolved).await
        };
        removed.map_err(|e| map_sftp_error(e, &resolved))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError> {
        let from = self.cwd.resolve(from);
        let to = self.cwd.resolve(to);
        info!("Renaming {} to {}", from, to);
        self.sftp()?
            .rename(&from, &to)
            .await
            .map_err(|e| map_sftp_error(e, &from))
    }

    async fn store_from(
        &mut self,
        path: &str,
        mut source: ByteSource,
        offset: u64,
    ) -> Result<u64, RemoteError> {
        let resolved = self.cwd.resolve(path);
        info!("Storing {} from offset {}", resolved, offset);

        let flags = if offset == 0 {
            OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::TRUNCATE
        } else {
            OpenFlags::CREATE | OpenFlags::WRITE
        };
        let mut file = self
            .sftp()?
            .open_with_flags(&resolved, flags)
            .await
            .map_err(|e| map_sftp_error(e, &resolved))?;

        let written = write_from_offset(&mut file, &mut source, offset).await?;
        file.shutdown().await?;
        Ok(written)
    }

    async fn retrieve_from(
        &mut self,
        path: &str,
        mut sink: ByteSink,
        offset: u64,
    ) -> Result<u64, RemoteError> {
        let resolved = self.cwd.resolve(path);
        info!("Retrieving {} from offset {}", resolved, offset);

        let mut file = self
            .sftp()?
            .open(&resolved)
            .await
            .map_err(|e| map_sftp_error(e, &resolved))?;

        read_from_offset(&mut file, &mut sink, offset).await
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        let Self { conn, cwd, .. } = self;
        let sftp = &conn.as_ref().ok_or(RemoteError::Closed)?.sftp;
        cwd.change_dir(path, |target| async move {
            exists_from_size(stat_size(sftp, &target).await)
        })
        .await?;
        debug!("Working directory is now {}", cwd.get());
        Ok(())
    }

    async fn current_directory(&mut self) -> Result<String, RemoteError> {
        self.sftp()?;
        Ok(self.cwd.get().to_string())
    }

    async fn quit(&mut self) -> Result<(), RemoteError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        info!("Closing SFTP session to {}", self.address);

        let closed = conn
            .sftp
            .close()
            .await
            .map_err(|e| RemoteError::Protocol(e.to_string()));
        if let Err(ref e) = closed {
            warn!("SFTP close failed: {}", e);
        }

        conn.handle
            .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
            .await?;
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_rules() {
        assert_eq!(entry_size("a", Some(10), EntryKind::File).unwrap(), 10);
        assert_eq!(entry_size("d", None, EntryKind::Directory).unwrap(), 0);
        assert!(matches!(
            entry_size("a", None, EntryKind::File),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            entry_size("big", Some(u64::MAX), EntryKind::File),
            Err(RemoteError::Protocol(_))
        ));
    }

    #[test]
    fn test_map_sftp_error() {
        let err = map_sftp_error(SftpErrorInner::UnexpectedBehavior("No such file".into()), "/x");
        match err {
            RemoteError::NotFound(path) => assert_eq!(path, "/x"),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let err = map_sftp_error(SftpErrorInner::UnexpectedBehavior("bad packet".into()), "/x");
        assert!(matches!(err, RemoteError::Protocol(_)));
    }
}
