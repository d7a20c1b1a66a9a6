//! Frame codec: a 4-byte big-endian length prefix followed by a MessagePack body.

use crate::utils::error::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const LENGTH_PREFIX_BYTES: usize = 4;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
pub const MIN_FRAME_BYTES: usize = 1024;
pub const MAX_FRAME_BYTES_CEILING: usize = u32::MAX as usize;

pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    read_exact(reader, &mut prefix).await?;

    let size = u32::from_be_bytes(prefix) as usize;
    if size > max_frame_bytes {
        return Err(RpcError::FrameTooLarge {
            size,
            limit: max_frame_bytes,
        });
    }

    let mut payload = vec![0u8; size];
    read_exact(reader, &mut payload).await?;
    Ok(payload)
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(payload.len()).map_err(|_| RpcError::FrameTooLarge {
        size: payload.len(),
        limit: MAX_FRAME_BYTES_CEILING,
    })?;

    writer.write_all(&size.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// 以欄位名稱編碼 (map)，不使用位置陣列
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

pub async fn read_message<R, T>(reader: &mut R, max_frame_bytes: usize) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(reader, max_frame_bytes).await?;
    decode(&frame)
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let payload = encode(message)?;
    write_frame(writer, &payload).await
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RpcError::ConnectionClosed),
        Err(e) => Err(RpcError::IoError(e)),
    }
}
