use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const SPOOL_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("upload exceeds the maximum size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("could not read upload: {0}")]
    Read(std::io::Error),

    #[error("could not buffer upload: {0}")]
    Io(std::io::Error),
}

/// An upload body parked on local disk; removed when dropped.
#[derive(Debug)]
pub struct SpooledUpload {
    file: NamedTempFile,
    pub size: u64,
}

impl SpooledUpload {
    /// Fresh reader positioned at the start of the spooled body.
    pub async fn reader(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.file.path()).await
    }
}

/// Copies `reader` into a temporary file, failing once `max_size` is exceeded.
pub async fn spool<R>(mut reader: R, max_size: u64) -> Result<SpooledUpload, SpoolError>
where
    R: AsyncRead + Unpin,
{
    let file = NamedTempFile::new().map_err(SpoolError::Io)?;
    let mut out = tokio::fs::File::from_std(file.reopen().map_err(SpoolError::Io)?);

    let mut buffer = vec![0u8; SPOOL_BUFFER_SIZE];
    let mut size: u64 = 0;
    loop {
        let n = reader.read(&mut buffer).await.map_err(SpoolError::Read)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        if size > max_size {
            return Err(SpoolError::TooLarge { max: max_size });
        }
        out.write_all(&buffer[..n]).await.map_err(SpoolError::Io)?;
    }
    out.flush().await.map_err(SpoolError::Io)?;

    Ok(SpooledUpload { file, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spool_round_trip() {
        let body = b"WEBVTT\n\n00:00.000 --> 00:01.000\nHello\n".to_vec();
        let spooled = spool(std::io::Cursor::new(body.clone()), 1024).await.unwrap();
        assert_eq!(spooled.size, body.len() as u64);

        let mut read_back = Vec::new();
        spooled
            .reader()
            .await
            .unwrap()
            .read_to_end(&mut read_back)
            .await
            .unwrap();
        assert_eq!(read_back, body);
    }

    #[tokio::test]
    async fn test_spool_enforces_limit() {
        let body = vec![b'a'; 100];
        let err = spool(std::io::Cursor::new(body), 99).await.unwrap_err();
        assert!(matches!(err, SpoolError::TooLarge { max: 99 }));
    }
}
