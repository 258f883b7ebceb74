//! FTP adapter
//!
//! The `ftp` crate is a blocking client, so every call runs on the blocking
//! pool with the control connection behind a mutex. Working directory state
//! lives on the server.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ftp::types::FileType;
use ftp::{status, FtpError, FtpStream};
use parking_lot::Mutex;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info, warn};

use super::error::RemoteError;
use super::ftp_list::parse_list_line;
use super::params::{ConnectionParams, Protocol};
use super::types::{checked_size, RemoteListing};
use super::{ByteSink, ByteSource, DialOptions, RemoteClient};

pub struct FtpClient {
    stream: Option<Arc<Mutex<FtpStream>>>,
    address: String,
}

impl FtpClient {
    /// Dial and log in. The dial timeout bounds both steps.
    pub async fn connect(
        params: &ConnectionParams,
        options: &DialOptions,
    ) -> Result<Self, RemoteError> {
        let address = params.address();
        info!("Connecting to FTP server at {}", address);

        let host = params.host.clone();
        let port = params.port;
        let username = params.username.clone();
        let password = params.password.clone();

        // A blocking connect cannot be cancelled. The flag tells a dial that
        // outlives the timeout to log out instead of leaving a session behind.
        let abandoned = Arc::new(AtomicBool::new(false));
        let flag = abandoned.clone();
        let io_timeout = options.ftp_dial_timeout;

        let dial = tokio::task::spawn_blocking(move || -> Result<FtpStream, RemoteError> {
            let mut stream = FtpStream::connect((host.as_str(), port))
                .map_err(|e| RemoteError::Connect(e.to_string()))?;
            set_control_timeout(&stream, Some(io_timeout))?;
            stream
                .login(&username, &password)
                .map_err(|e| RemoteError::Connect(format!("Login failed: {}", e)))?;
            stream
                .transfer_type(FileType::Binary)
                .map_err(|e| RemoteError::Connect(format!("Binary mode rejected: {}", e)))?;

            if flag.load(Ordering::Acquire) {
                debug!("Dial finished after its timeout, logging out");
                let _ = stream.quit();
                return Err(RemoteError::Timeout("FTP dial abandoned".to_string()));
            }
            set_control_timeout(&stream, None)?;
            Ok(stream)
        });

        let stream = match tokio::time::timeout(options.ftp_dial_timeout, dial).await {
            Ok(joined) => {
                joined.map_err(|e| RemoteError::Connect(format!("FTP dial task failed: {}", e)))??
            }
            Err(_) => {
                abandoned.store(true, Ordering::Release);
                return Err(RemoteError::Timeout(format!(
                    "FTP dial to {} timed out",
                    address
                )));
            }
        };

        info!("FTP login successful at {}", address);

        Ok(Self {
            stream: Some(Arc::new(Mutex::new(stream))),
            address,
        })
    }

    /// Run a blocking operation against the control connection.
    async fn with_stream<F, T>(&self, op: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&mut FtpStream) -> Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let stream = self.stream.clone().ok_or(RemoteError::Closed)?;
        tokio::task::spawn_blocking(move || {
            let mut guard = stream.lock();
            op(&mut guard)
        })
        .await
        .map_err(|e| RemoteError::Network(format!("FTP task failed: {}", e)))?
    }
}

/// Map FTP errors to our error type
fn map_ftp_error(err: FtpError, path: &str) -> RemoteError {
    match err {
        FtpError::ConnectionError(e) => RemoteError::Network(e.to_string()),
        FtpError::InvalidResponse(msg) if msg.contains("550") => {
            RemoteError::NotFound(path.to_string())
        }
        other => RemoteError::Protocol(other.to_string()),
    }
}

/// Bound reads and writes on the control connection while logging in.
fn set_control_timeout(stream: &FtpStream, timeout: Option<Duration>) -> Result<(), RemoteError> {
    let control = stream.get_ref();
    control
        .set_read_timeout(timeout)
        .and_then(|_| control.set_write_timeout(timeout))
        .map_err(|e| RemoteError::Connect(format!("Socket setup failed: {}", e)))
}

/// Send `REST <offset>` so the next STOR or RETR starts at `offset`.
///
/// The `ftp` crate has no wrapper for REST, so the command is written to the
/// control socket directly and the 350 reply is read through the stream.
fn restart_at(ftp: &mut FtpStream, offset: u64) -> Result<(), FtpError> {
    let mut control = ftp.get_ref();
    control
        .write_all(format!("REST {}\r\n", offset).as_bytes())
        .map_err(FtpError::ConnectionError)?;
    ftp.read_response(status::REQUEST_FILE_PENDING)?;
    Ok(())
}

/// Decide whether an upload may resume at `offset`.
///
/// The server appends at the REST point, so the remote file must already
/// hold exactly `offset` bytes. A missing file holds zero.
fn check_resume_offset(
    existing: Result<Option<usize>, RemoteError>,
    offset: u64,
) -> Result<(), RemoteError> {
    let actual = match existing {
        Ok(Some(size)) => size as u64,
        Ok(None) | Err(RemoteError::NotFound(_)) => 0,
        Err(e) => return Err(e),
    };
    if actual != offset {
        return Err(RemoteError::OffsetMismatch {
            requested: offset,
            actual,
        });
    }
    Ok(())
}

/// Reader that remembers how many bytes passed through it.
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[async_trait]
impl RemoteClient for FtpClient {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    async fn list(&mut self, path: &str) -> Result<RemoteListing, RemoteError> {
        debug!("Listing directory: {:?}", path);
        let target = path.to_string();
        let lines = self
            .with_stream(move |ftp| {
                let arg = match target.as_str() {
                    "" | "." => None,
                    other => Some(other),
                };
                ftp.list(arg).map_err(|e| map_ftp_error(e, &target))
            })
            .await?;

        let now = Utc::now();
        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Some(entry) = parse_list_line(line, now)? {
                entries.push(entry);
            }
        }

        debug!("Listed {} entries in {:?}", entries.len(), path);
        Ok(RemoteListing::new(path, entries))
    }

    async fn file_size(&mut self, path: &str) -> Result<i64, RemoteError> {
        let target = path.to_string();
        self.with_stream(move |ftp| match ftp.size(&target) {
            Ok(Some(size)) => checked_size(&target, size as u64),
            Ok(None) => Err(RemoteError::NotFound(target)),
            Err(e) => Err(map_ftp_error(e, &target)),
        })
        .await
    }

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError> {
        info!("Deleting: {}", path);
        let target = path.to_string();
        self.with_stream(move |ftp| ftp.rm(&target).map_err(|e| map_ftp_error(e, &target)))
            .await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError> {
        info!("Renaming {} to {}", from, to);
        let from = from.to_string();
        let to = to.to_string();
        self.with_stream(move |ftp| ftp.rename(&from, &to).map_err(|e| map_ftp_error(e, &from)))
            .await
    }

    async fn store_from(
        &mut self,
        path: &str,
        source: ByteSource,
        offset: u64,
    ) -> Result<u64, RemoteError> {
        info!("Storing {} from offset {}", path, offset);
        let target = path.to_string();
        let reader = SyncIoBridge::new(source);

        self.with_stream(move |ftp| {
            if offset > 0 {
                let existing = ftp.size(&target).map_err(|e| map_ftp_error(e, &target));
                check_resume_offset(existing, offset)?;
                restart_at(ftp, offset).map_err(|e| map_ftp_error(e, &target))?;
            }

            let mut counted = CountingReader {
                inner: reader,
                count: 0,
            };
            ftp.put(&target, &mut counted)
                .map_err(|e| map_ftp_error(e, &target))?;
            Ok(counted.count)
        })
        .await
    }

    async fn retrieve_from(
        &mut self,
        path: &str,
        sink: ByteSink,
        offset: u64,
    ) -> Result<u64, RemoteError> {
        info!("Retrieving {} from offset {}", path, offset);
        let target = path.to_string();
        let writer = SyncIoBridge::new(sink);

        self.with_stream(move |ftp| {
            if offset > 0 {
                restart_at(ftp, offset).map_err(|e| map_ftp_error(e, &target))?;
            }

            let writer = RefCell::new(writer);
            let copied = ftp
                .retr(&target, |reader| {
                    std::io::copy(reader, &mut *writer.borrow_mut())
                        .map_err(FtpError::ConnectionError)
                })
                .map_err(|e| map_ftp_error(e, &target))?;
            writer.into_inner().flush()?;
            Ok(copied)
        })
        .await
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        debug!("Changing directory to {:?}", path);
        let target = path.to_string();
        self.with_stream(move |ftp| ftp.cwd(&target).map_err(|e| map_ftp_error(e, &target)))
            .await
    }

    async fn current_directory(&mut self) -> Result<String, RemoteError> {
        self.with_stream(|ftp| ftp.pwd().map_err(|e| map_ftp_error(e, ".")))
            .await
    }

    async fn quit(&mut self) -> Result<(), RemoteError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        info!("Closing FTP session to {}", self.address);

        tokio::task::spawn_blocking(move || {
            let mut guard = stream.lock();
            guard.quit().map_err(|e| map_ftp_error(e, ""))
        })
        .await
        .map_err(|e| {
            warn!("FTP quit task failed: {}", e);
            RemoteError::Network(format!("FTP task failed: {}", e))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Scripted control connection on localhost: greet after `delay`, then
    /// answer each received command with the next reply. Returns the port
    /// and a handle yielding the commands seen.
    fn control_server(
        delay: Duration,
        replies: Vec<&'static str>,
    ) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            thread::sleep(delay);
            socket.write_all(b"220 ready\r\n").unwrap();

            let mut reader = BufReader::new(socket.try_clone().unwrap());
            let mut seen = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                seen.push(line.trim_end().to_string());
                socket.write_all(format!("{}\r\n", reply).as_bytes()).unwrap();
            }
            seen
        });
        (port, handle)
    }

    fn local_params(port: u16) -> ConnectionParams {
        ConnectionParams::parse(&format!("u:p@127.0.0.1:{}", port)).unwrap()
    }

    #[tokio::test]
    async fn test_rest_precedes_resumed_transfer() {
        let (port, server) = control_server(
            Duration::ZERO,
            vec!["230 ok", "200 ok", "350 Restarting at 1024", "221 bye"],
        );
        let mut client = FtpClient::connect(&local_params(port), &DialOptions::default())
            .await
            .unwrap();
        client
            .with_stream(|ftp| restart_at(ftp, 1024).map_err(|e| map_ftp_error(e, "a.bin")))
            .await
            .unwrap();
        client.quit().await.unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen, vec!["USER u", "TYPE I", "REST 1024", "QUIT"]);
    }

    #[tokio::test]
    async fn test_store_with_wrong_offset_writes_nothing() {
        let (port, server) = control_server(
            Duration::ZERO,
            vec!["230 ok", "200 ok", "213 512", "221 bye"],
        );
        let mut client = FtpClient::connect(&local_params(port), &DialOptions::default())
            .await
            .unwrap();
        let result = client.store_from("a.bin", Box::new(&b"tail"[..]), 1024).await;
        assert!(matches!(
            result,
            Err(RemoteError::OffsetMismatch {
                requested: 1024,
                actual: 512
            })
        ));
        client.quit().await.unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen, vec!["USER u", "TYPE I", "SIZE a.bin", "QUIT"]);
    }

    #[tokio::test]
    async fn test_dial_finishing_after_timeout_logs_out() {
        let (port, server) = control_server(
            Duration::from_millis(600),
            vec!["230 ok", "200 ok", "221 bye"],
        );
        let options = DialOptions {
            ftp_dial_timeout: Duration::from_millis(200),
            ..DialOptions::default()
        };
        let result = FtpClient::connect(&local_params(port), &options).await;
        assert!(matches!(result, Err(RemoteError::Timeout(_))));

        let seen = tokio::task::spawn_blocking(move || server.join().unwrap())
            .await
            .unwrap();
        assert_eq!(seen.last().map(String::as_str), Some("QUIT"));
    }

    #[test]
    fn test_map_ftp_error() {
        let err = map_ftp_error(
            FtpError::InvalidResponse("Expected code [213], got response: 550 No such file".into()),
            "/dl/a.bin",
        );
        match err {
            RemoteError::NotFound(path) => assert_eq!(path, "/dl/a.bin"),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let err = map_ftp_error(
            FtpError::InvalidResponse("Expected code [226], got response: 426 aborted".into()),
            "x",
        );
        assert!(matches!(err, RemoteError::Protocol(_)));

        let err = map_ftp_error(
            FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe",
            )),
            "x",
        );
        assert!(matches!(err, RemoteError::Network(_)));
    }

    #[test]
    fn test_resume_offset_must_match_remote_size() {
        assert!(check_resume_offset(Ok(Some(1024)), 1024).is_ok());

        match check_resume_offset(Ok(Some(512)), 1024) {
            Err(RemoteError::OffsetMismatch { requested, actual }) => {
                assert_eq!(requested, 1024);
                assert_eq!(actual, 512);
            }
            other => panic!("Expected OffsetMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_resume_offset_missing_file_holds_zero() {
        let missing = Err(RemoteError::NotFound("/dl/a.bin".into()));
        match check_resume_offset(missing, 10) {
            Err(RemoteError::OffsetMismatch { actual, .. }) => assert_eq!(actual, 0),
            other => panic!("Expected OffsetMismatch, got {:?}", other),
        }
        assert!(matches!(
            check_resume_offset(Ok(None), 10),
            Err(RemoteError::OffsetMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn test_resume_offset_passes_other_errors_through() {
        let err = Err(RemoteError::Network("reset".into()));
        assert!(matches!(
            check_resume_offset(err, 10),
            Err(RemoteError::Network(_))
        ));
    }

    #[test]
    fn test_counting_reader() {
        let mut reader = CountingReader {
            inner: &b"abcdef"[..],
            count: 0,
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.count, 6);
        assert_eq!(out, b"abcdef".to_vec());
    }
}
