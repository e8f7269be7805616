//! Staging of request bodies.
//!
//! Upload bodies are read once, hashed while they stream in, checked
//! against `Content-Length` and `Content-MD5`, and kept either in memory or,
//! above a size threshold, in a temporary file under the cache directory.
//! A spilled file is removed when the last [`StagedData`] handle to it is
//! dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{trace, warn};

use crate::body::ObjectBody;
use crate::checksums::{self, Md5Digest};
use crate::error::{GatewayError, GatewayResult};

/// Chunk size used when streaming a spilled file back out.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// A temporary file holding staged bytes; removed on drop.
#[derive(Debug)]
pub struct SpillFile {
    path: PathBuf,
    size: u64,
}

impl SpillFile {
    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove staged file");
            }
        } else {
            trace!(path = %self.path.display(), "removed staged file");
        }
    }
}

/// Staged bytes, in memory or on disk.
#[derive(Debug, Clone)]
pub enum StagedData {
    /// Small payloads kept in memory.
    InMemory {
        /// The bytes.
        data: Bytes,
    },
    /// Large payloads spilled to a temporary file.
    OnDisk(Arc<SpillFile>),
}

impl StagedData {
    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::InMemory { data } => data.len() as u64,
            Self::OnDisk(file) => file.size,
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream the payload in chunks.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self {
            Self::InMemory { data } => stream::once(async move { Ok(data) }).boxed(),
            Self::OnDisk(file) => stream::once(async move {
                let handle = tokio::fs::File::open(&file.path).await?;
                Ok::<_, io::Error>(stream::try_unfold((handle, file), |(handle, file)| {
                    read_chunk(handle, file)
                }))
            })
            .try_flatten()
            .boxed(),
        }
    }

    /// A body streaming this payload.
    #[must_use]
    pub fn into_body(self) -> ObjectBody {
        let length = self.len();
        ObjectBody::from_stream(self.into_stream(), Some(length))
    }
}

type ChunkState = (tokio::fs::File, Arc<SpillFile>);

async fn read_chunk(
    mut handle: tokio::fs::File,
    file: Arc<SpillFile>,
) -> io::Result<Option<(Bytes, ChunkState)>> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    if handle.read_buf(&mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some((buf.freeze(), (handle, file))))
}

/// The outcome of staging one body.
#[derive(Debug, Clone)]
pub struct Staged {
    /// The bytes.
    pub data: StagedData,
    /// Raw MD5 of the bytes.
    pub md5: Md5Digest,
}

impl Staged {
    /// Quoted hex ETag.
    #[must_use]
    pub fn etag(&self) -> String {
        checksums::format_etag(&self.md5)
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len()
    }
}

/// Where staged bytes go and how large an in-memory payload may be.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    memory_limit: u64,
}

enum Sink {
    Memory(BytesMut),
    Disk {
        file: tokio::fs::File,
        spill: SpillFile,
    },
}

impl StagingArea {
    /// Stage under `dir`, keeping payloads of at most `memory_limit` bytes in memory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, memory_limit: u64) -> Self {
        Self {
            dir: dir.into(),
            memory_limit,
        }
    }

    /// Same directory, different threshold.
    #[must_use]
    pub fn with_memory_limit(&self, memory_limit: u64) -> Self {
        Self {
            dir: self.dir.clone(),
            memory_limit,
        }
    }

    /// Read `body`, which must be exactly `expected_len` bytes long.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::IncompleteBody`] when the body is shorter or longer
    ///   than `expected_len`.
    /// - [`GatewayError::BadDigest`] when `content_md5` is given and differs.
    /// - [`GatewayError::Internal`] on read or spill failures.
    pub async fn stage(
        &self,
        mut body: ObjectBody,
        expected_len: u64,
        content_md5: Option<Md5Digest>,
    ) -> GatewayResult<Staged> {
        let mut sink = if expected_len > self.memory_limit {
            self.create_spill_file().await?
        } else {
            Sink::Memory(BytesMut::with_capacity(
                usize::try_from(expected_len).unwrap_or_default(),
            ))
        };

        let mut hasher = Md5::new();
        let mut received: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                GatewayError::Internal(anyhow::Error::new(e).context("failed to read request body"))
            })?;
            received += chunk.len() as u64;
            if received > expected_len {
                return Err(GatewayError::IncompleteBody {
                    expected: expected_len,
                    received,
                });
            }
            hasher.update(&chunk);
            match &mut sink {
                Sink::Memory(buf) => buf.extend_from_slice(&chunk),
                Sink::Disk { file, spill } => file.write_all(&chunk).await.map_err(|e| {
                    GatewayError::Internal(anyhow::anyhow!(
                        "failed to write staged file {}: {e}",
                        spill.path.display()
                    ))
                })?,
            }
        }
        if received != expected_len {
            return Err(GatewayError::IncompleteBody {
                expected: expected_len,
                received,
            });
        }

        let md5 = checksums::finish(hasher);
        if content_md5.is_some_and(|expected| expected != md5) {
            return Err(GatewayError::BadDigest);
        }

        let data = match sink {
            Sink::Memory(buf) => StagedData::InMemory { data: buf.freeze() },
            Sink::Disk {
                mut file,
                mut spill,
            } => {
                spill.size = received;
                file.flush().await.map_err(|e| {
                    GatewayError::Internal(anyhow::anyhow!(
                        "failed to flush staged file {}: {e}",
                        spill.path.display()
                    ))
                })?;
                trace!(path = %spill.path.display(), size = received, "staged body to disk");
                StagedData::OnDisk(Arc::new(spill))
            }
        };
        Ok(Staged { data, md5 })
    }

    async fn create_spill_file(&self) -> GatewayResult<Sink> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!(
                "failed to create staging directory {}: {e}",
                self.dir.display()
            ))
        })?;
        let temp = tempfile::Builder::new()
            .prefix("s3gate-")
            .tempfile_in(&self.dir)
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("failed to create temp file: {e}")))?;
        let (file, temp_path) = temp.into_parts();
        let path = temp_path.keep().map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!("failed to keep temp file: {e}"))
        })?;
        Ok(Sink::Disk {
            file: tokio::fs::File::from_std(file),
            spill: SpillFile { path, size: 0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(parts: &[&'static [u8]]) -> ObjectBody {
        let chunks: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect();
        ObjectBody::from_stream(stream::iter(chunks), None)
    }

    #[tokio::test]
    async fn test_should_stage_small_body_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path(), 1024);
        let staged = area.stage(chunked(&[b"hel", b"lo"]), 5, None).await.unwrap();
        assert!(matches!(staged.data, StagedData::InMemory { .. }));
        assert_eq!(staged.etag(), "\"5d41402abc4b2a76b9719d911017c592\"");
        assert_eq!(staged.size(), 5);
    }

    #[tokio::test]
    async fn test_should_spill_large_body_and_remove_it_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path(), 4);
        let staged = area
            .stage(chunked(&[b"hello ", b"world"]), 11, None)
            .await
            .unwrap();

        let StagedData::OnDisk(file) = &staged.data else {
            panic!("expected on-disk payload");
        };
        let path = file.path().to_path_buf();
        assert!(path.exists());

        let bytes = staged.data.clone().into_body().collect().await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello world"));

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_should_reject_short_and_long_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path(), 1024);

        let err = area.stage(chunked(&[b"abc"]), 5, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::IncompleteBody { expected: 5, received: 3 }));

        let err = area.stage(chunked(&[b"abcdef"]), 5, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::IncompleteBody { expected: 5, .. }));
    }

    #[tokio::test]
    async fn test_should_verify_content_md5() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path(), 1024);

        let good = checksums::compute_md5(b"hello");
        assert!(area.stage(chunked(&[b"hello"]), 5, Some(good)).await.is_ok());

        let bad = checksums::compute_md5(b"other");
        let err = area
            .stage(chunked(&[b"hello"]), 5, Some(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BadDigest));
    }
}
