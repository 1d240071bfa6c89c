//! Length-prefixed framing: a 4-byte big-endian length followed by that
//! many payload bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ChannelError;

/// Default cap on one frame's payload size.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Read one length-prefixed frame, rejecting anything over `max_bytes`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Vec<u8>, ChannelError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_bytes {
        return Err(ChannelError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), ChannelError> {
    let len = u32::try_from(payload.len()).map_err(|_| ChannelError::FrameTooLarge(payload.len()))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, b"hello world").await.unwrap();
        let got = read_frame(&mut server, DEFAULT_MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn oversize_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, b"0123456789").await.unwrap();
        let err = read_frame(&mut server, 5).await.unwrap_err();
        assert!(matches!(err, ChannelError::FrameTooLarge(10)));
    }
}
