//! Scripted stand-ins for the remote transports and the clipboard

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::clipboard::{ClipboardError, ClipboardSource};
use crate::remote::{
    ByteSink, ByteSource, ConnectionParams, Connector, Protocol, RemoteClient, RemoteError,
    RemoteListing,
};

/// Per-session script: `list` results in order, and whether chdir fails
pub type Script = (Vec<Result<RemoteListing, RemoteError>>, bool);

/// Shared counters observed by the tests
#[derive(Default)]
pub struct Probe {
    pub connects: AtomicUsize,
    pub quits: AtomicUsize,
    pub chdirs: Mutex<Vec<String>>,
}

/// One scripted session: what each `list` returns, in order
pub struct FakeClient {
    lists: VecDeque<Result<RemoteListing, RemoteError>>,
    chdir_fails: bool,
    probe: Arc<Probe>,
}

#[async_trait]
impl RemoteClient for FakeClient {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    async fn list(&mut self, _path: &str) -> Result<RemoteListing, RemoteError> {
        self.lists.pop_front().unwrap_or(Err(RemoteError::Closed))
    }

    async fn file_size(&mut self, path: &str) -> Result<i64, RemoteError> {
        Err(RemoteError::NotFound(path.to_string()))
    }

    async fn delete(&mut self, _path: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn rename(&mut self, _from: &str, _to: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn store_from(
        &mut self,
        _path: &str,
        _source: ByteSource,
        _offset: u64,
    ) -> Result<u64, RemoteError> {
        Ok(0)
    }

    async fn retrieve_from(
        &mut self,
        _path: &str,
        _sink: ByteSink,
        _offset: u64,
    ) -> Result<u64, RemoteError> {
        Ok(0)
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        self.probe.chdirs.lock().push(path.to_string());
        if self.chdir_fails {
            Err(RemoteError::NotFound(path.to_string()))
        } else {
            Ok(())
        }
    }

    async fn current_directory(&mut self) -> Result<String, RemoteError> {
        Ok("/".to_string())
    }

    async fn quit(&mut self) -> Result<(), RemoteError> {
        self.probe.quits.fetch_add(1, Ordering::SeqCst);
        Err(RemoteError::Network("already gone".into()))
    }
}

/// Hands out scripted sessions; dial fails once the script runs out
pub struct FakeConnector {
    sessions: Mutex<VecDeque<Script>>,
    pub probe: Arc<Probe>,
}

impl FakeConnector {
    pub fn new(sessions: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            probe: Arc::new(Probe::default()),
        })
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _params: &ConnectionParams,
    ) -> Result<Box<dyn RemoteClient>, RemoteError> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        let (lists, chdir_fails) = self
            .sessions
            .lock()
            .pop_front()
            .ok_or_else(|| RemoteError::Connect("refused".into()))?;
        Ok(Box::new(FakeClient {
            lists: lists.into(),
            chdir_fails,
            probe: self.probe.clone(),
        }))
    }
}

/// Clipboard that replays queued reads
#[derive(Default)]
pub struct FakeClipboard {
    pub reads: VecDeque<Result<String, ClipboardError>>,
    pub read_count: Arc<AtomicUsize>,
}

impl FakeClipboard {
    pub fn with_text(texts: &[&str]) -> Self {
        Self {
            reads: texts.iter().map(|t| Ok(t.to_string())).collect(),
            read_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ClipboardSource for FakeClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.reads.pop_front().unwrap_or_else(|| Ok(String::new()))
    }
}
