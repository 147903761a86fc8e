use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Reader that fails once more than `max` bytes have been produced.
///
/// The error surfaces through whatever is consuming the stream; callers check
/// [`SizeLimitedReader::exceeded`] afterwards to tell it apart from real I/O
/// failures.
pub struct SizeLimitedReader<R> {
    inner: R,
    max: u64,
    read: u64,
    exceeded: bool,
}

impl<R> SizeLimitedReader<R> {
    pub fn new(inner: R, max: u64) -> Self {
        Self {
            inner,
            max,
            read: 0,
            exceeded: false,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SizeLimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.exceeded {
            return Poll::Ready(Err(limit_error()));
        }

        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.read += (buf.filled().len() - before) as u64;
                if this.read > this.max {
                    this.exceeded = true;
                    // An erroring read must not report filled bytes
                    buf.set_filled(before);
                    return Poll::Ready(Err(limit_error()));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

fn limit_error() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "upload size limit exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_within_limit() {
        let mut reader = SizeLimitedReader::new(Cursor::new(vec![1u8; 10]), 10);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 10);
        assert!(!reader.exceeded());
    }

    #[tokio::test]
    async fn test_over_limit() {
        let mut reader = SizeLimitedReader::new(Cursor::new(vec![1u8; 11]), 10);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).await.is_err());
        assert!(reader.exceeded());
        assert_eq!(reader.bytes_read(), 11);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_chunk_is_not_handed_out() {
        let mut reader = SizeLimitedReader::new(Cursor::new(vec![7u8; 32]), 8);
        let mut chunk = [0u8; 16];
        let err = reader.read(&mut chunk).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(reader.exceeded());
        // Stays failed
        assert!(reader.read(&mut chunk).await.is_err());
    }
}
