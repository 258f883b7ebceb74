//! Resumable transfer helpers
//!
//! Shared by the adapters whose transports expose a seekable remote handle.
//! The cursor position the seek reports is checked against the requested
//! offset before a single byte moves.

use std::io::SeekFrom;

use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::error::RemoteError;

/// Seek `cursor` to `offset` and verify where it landed.
pub async fn seek_to_offset<S>(cursor: &mut S, offset: u64) -> Result<(), RemoteError>
where
    S: AsyncSeek + Unpin + ?Sized,
{
    let landed = cursor.seek(SeekFrom::Start(offset)).await?;
    if landed != offset {
        return Err(RemoteError::OffsetMismatch {
            requested: offset,
            actual: landed,
        });
    }
    Ok(())
}

/// Write everything from `source` into `dest` starting at `offset`.
///
/// Returns the number of bytes written in this call (not including `offset`).
pub async fn write_from_offset<W, R>(
    dest: &mut W,
    source: &mut R,
    offset: u64,
) -> Result<u64, RemoteError>
where
    W: AsyncWrite + AsyncSeek + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    seek_to_offset(dest, offset).await?;
    let written = tokio::io::copy(source, dest).await?;
    dest.flush().await?;
    debug!("Wrote {} bytes from offset {}", written, offset);
    Ok(written)
}

/// Copy `source` into `sink`, skipping the first `offset` bytes of `source`.
pub async fn read_from_offset<R, W>(
    source: &mut R,
    sink: &mut W,
    offset: u64,
) -> Result<u64, RemoteError>
where
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    seek_to_offset(source, offset).await?;
    let read = tokio::io::copy(source, sink).await?;
    sink.flush().await?;
    debug!("Read {} bytes from offset {}", read, offset);
    Ok(read)
}
