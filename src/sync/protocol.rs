//! Length-prefixed framing for the collaboration channel
//!
//! Each frame is a u64 little-endian length followed by that many payload
//! bytes. An empty frame is a keepalive and carries no message.

use anyhow::{Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Frames larger than this are rejected before allocating
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Send a message with length prefix
pub async fn send_msg<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    let len = data.len() as u64;
    writer.write_all(&len.to_le_bytes()).await?;
    if !data.is_empty() {
        writer.write_all(data).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Receive a message with length prefix.
///
/// Returns `None` when the stream ends cleanly between frames.
pub async fn recv_msg<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 8];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN as u64 {
        bail!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN);
    }
    let len = usize::try_from(len)?;

    if len == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(Some(data))
}

/// Read frames from `reader` into `frames` until the stream ends or the
/// receiving side goes away. Keepalives are swallowed.
///
/// The channel is bounded so a slow mutation loop pushes back on the reader.
pub fn spawn_frame_reader<R>(mut reader: R, frames: mpsc::Sender<Vec<u8>>) -> JoinHandle<Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut received = 0u64;
        loop {
            let Some(frame) = recv_msg(&mut reader).await? else {
                tracing::debug!(received, "collaboration stream ended");
                return Ok(());
            };
            if frame.is_empty() {
                continue;
            }
            received += 1;
            if frames.send(frame).await.is_err() {
                tracing::debug!(received, "frame receiver dropped");
                return Ok(());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &[u8]) -> Vec<u8> {
        let mut out = (data.len() as u64).to_le_bytes().to_vec();
        out.extend_from_slice(data);
        out
    }

    #[tokio::test]
    async fn send_writes_length_then_payload() {
        let mut writer = tokio_test::io::Builder::new()
            .write(&5u64.to_le_bytes())
            .write(b"hello")
            .build();
        send_msg(&mut writer, b"hello").await.unwrap();
    }

    #[tokio::test]
    async fn keepalive_is_just_a_zero_length() {
        let mut writer = tokio_test::io::Builder::new()
            .write(&0u64.to_le_bytes())
            .build();
        send_msg(&mut writer, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn recv_reads_frames_and_detects_end() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&frame(b"abc"))
            .read(&frame(b""))
            .build();
        assert_eq!(recv_msg(&mut reader).await.unwrap(), Some(b"abc".to_vec()));
        assert_eq!(recv_msg(&mut reader).await.unwrap(), Some(Vec::new()));
        assert_eq!(recv_msg(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&((MAX_FRAME_LEN as u64) + 1).to_le_bytes())
            .build();
        assert!(recv_msg(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn length_beyond_usize_is_rejected_not_truncated() {
        // truncates to 16 on 32-bit targets
        let len = (1u64 << 32) + 16;
        let mut reader = tokio_test::io::Builder::new()
            .read(&len.to_le_bytes())
            .build();
        let err = recv_msg(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[tokio::test]
    async fn reader_forwards_payloads_and_skips_keepalives() {
        let mut bytes = frame(b"one");
        bytes.extend(frame(b""));
        bytes.extend(frame(b"two"));
        let reader = tokio_test::io::Builder::new().read(&bytes).build();

        let (tx, mut rx) = mpsc::channel(4);
        let task = spawn_frame_reader(reader, tx);

        assert_eq!(rx.recv().await, Some(b"one".to_vec()));
        assert_eq!(rx.recv().await, Some(b"two".to_vec()));
        assert_eq!(rx.recv().await, None);
        task.await.unwrap().unwrap();
    }
}
