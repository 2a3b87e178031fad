use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on parts per frame. A peer exceeding it poisons the connection.
pub(crate) const MAX_PARTS: u32 = 1024;

/// Hard cap on a single part, 64 MiB.
pub(crate) const MAX_PART_LEN: u32 = 64 * 1024 * 1024;

/// Read one multipart frame: `u32 part_count`, then `u32 len` + bytes per
/// part. Big-endian, like the message tags it carries.
pub(crate) async fn read_frame<S>(stream: &mut S) -> std::io::Result<Vec<Bytes>>
where
    S: AsyncRead + Unpin,
{
    let count = stream.read_u32().await?;
    if count == 0 || count > MAX_PARTS {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame part count {count} out of range"),
        ));
    }
    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = stream.read_u32().await?;
        if len > MAX_PART_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame part of {len} bytes exceeds the cap"),
            ));
        }
        let mut part = BytesMut::zeroed(len as usize);
        stream.read_exact(&mut part).await?;
        parts.push(part.freeze());
    }
    Ok(parts)
}

/// Write one multipart frame. Part bytes go to the socket straight from
/// their [`Bytes`] handles; the payload is never re-buffered.
pub(crate) async fn write_frame<S>(stream: &mut S, parts: &[Bytes]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_u32(parts.len() as u32).await?;
    for part in parts {
        stream.write_u32(part.len() as u32).await?;
        stream.write_all(part).await?;
    }
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{read_frame, write_frame};

    #[tokio::test]
    async fn frames_roundtrip_over_a_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024 * 1024);
        let frames = [
            vec![Bytes::from_static(&[0x05])],
            vec![
                Bytes::from_static(&[0x02]),
                Bytes::new(),
                Bytes::new(),
                Bytes::new(),
                Bytes::new(),
                Bytes::from_static(b"payload"),
            ],
        ];

        for frame in &frames {
            write_frame(&mut a, frame).await.expect("write");
        }
        for frame in &frames {
            let read = read_frame(&mut b).await.expect("read");
            assert_eq!(&read, frame);
        }
    }

    #[tokio::test]
    async fn oversized_part_count_is_invalid_data() {
        let (mut a, mut b) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_u32(&mut a, u32::MAX)
            .await
            .expect("write");
        let err = read_frame(&mut b).await.expect_err("must fail");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
