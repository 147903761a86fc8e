//! Single-pass inspection of an upload stream.
//!
//! The source may be a network body that cannot be rewound, so the header used
//! for sniffing is buffered once and then fed to the hash and the sink before
//! the rest of the stream is copied through.

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::magic;

/// Number of leading bytes used for type detection
pub const SNIFF_LEN: usize = 512;

const CHUNK_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("Failed to read upload stream: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write content: {0}")]
    Write(#[source] std::io::Error),
}

/// What a full pass over a stream produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub mimetype: String,
    /// Lowercase hex SHA-256 of every byte read
    pub sha256sum: String,
    pub size: u64,
}

/// Fill up to [`SNIFF_LEN`] bytes from `reader`, stopping early only at EOF.
pub async fn read_header<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    Ok(header)
}

/// Copy `reader` into `sink` while sniffing, hashing and counting.
pub async fn inspect_to<R, W>(reader: &mut R, sink: &mut W) -> Result<Inspection, InspectError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = read_header(reader).await.map_err(InspectError::Read)?;
    let detected = magic::detect(&header);

    let mut hasher = Sha256::new();
    hasher.update(&header);
    sink.write_all(&header).await.map_err(InspectError::Write)?;
    let mut size = header.len() as u64;

    let mut chunk = vec![0u8; CHUNK_LEN];
    loop {
        let n = reader.read(&mut chunk).await.map_err(InspectError::Read)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        sink.write_all(&chunk[..n])
            .await
            .map_err(InspectError::Write)?;
        size += n as u64;
    }
    sink.flush().await.map_err(InspectError::Write)?;

    Ok(Inspection {
        mimetype: detected.mimetype.to_string(),
        sha256sum: hex::encode(hasher.finalize()),
        size,
    })
}
